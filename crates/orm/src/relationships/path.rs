//! Relation paths: `"customer/address"` at the API boundary, a list of steps
//! inside the resolver

use crate::model::ModelInstance;

/// One hop of a relation path
#[derive(Debug, Clone, Copy)]
pub enum RelationStep<'a> {
    /// Relation name (or related model name) on the current model
    Name(&'a str),
    /// Relation towards the model of this instance
    Instance(&'a ModelInstance),
}

impl<'a> RelationStep<'a> {
    /// Name used for prefixes and lookups
    pub fn name(&self) -> &'a str {
        match self {
            RelationStep::Name(name) => name,
            RelationStep::Instance(instance) => instance.model_name(),
        }
    }
}

impl<'a> From<&'a str> for RelationStep<'a> {
    fn from(name: &'a str) -> Self {
        RelationStep::Name(name)
    }
}

impl<'a> From<&'a ModelInstance> for RelationStep<'a> {
    fn from(instance: &'a ModelInstance) -> Self {
        RelationStep::Instance(instance)
    }
}

/// Parsed `/`-separated relation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPath {
    names: Vec<String>,
}

impl RelationPath {
    /// Split on `/`, ignoring empty segments and surrounding whitespace
    pub fn parse(path: &str) -> Self {
        Self {
            names: path
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn steps(&self) -> Vec<RelationStep<'_>> {
        self.names.iter().map(|n| RelationStep::Name(n.as_str())).collect()
    }

    /// Names joined with `separator`, used for select prefixes
    pub fn join(&self, separator: &str) -> String {
        self.names.join(separator)
    }
}
