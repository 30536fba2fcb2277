//! Built, immutable per-model schema

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::descriptor::{FieldValidation, KeyType};
use crate::config::DataMapperConfig;
use crate::query::OrderDirection;
use crate::relationships::{RelationDef, Relations};

/// Everything the rest of the crate needs to know about a model. Shared
/// between instances behind an `Arc` and never mutated after the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub model_name: String,
    pub table_name: String,
    pub primary_keys: IndexMap<String, KeyType>,
    /// Columns of the table, in the order the storage engine reported them
    pub fields: Vec<String>,
    pub relations: Relations,
    /// One entry per field (plus any extra declared entries)
    pub validation: IndexMap<String, FieldValidation>,
    pub default_order_by: Vec<(String, Option<OrderDirection>)>,
    pub config: DataMapperConfig,
}

impl ModelSchema {
    pub fn key_names(&self) -> Vec<String> {
        self.primary_keys.keys().cloned().collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn is_key(&self, field: &str) -> bool {
        self.primary_keys.contains_key(field)
    }

    /// Relation by name or, failing that, by related model
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.find(name)
    }

    pub fn get_rules(&self, field: &str) -> &[String] {
        self.validation
            .get(field)
            .map(|v| v.get_rules.as_slice())
            .unwrap_or_default()
    }

    /// `(field, matched_field)` pairs of every `matches` rule
    pub fn matches(&self) -> impl Iterator<Item = (&str, &str)> {
        self.validation
            .iter()
            .filter_map(|(field, v)| v.matches.as_deref().map(|other| (field.as_str(), other)))
    }

    /// Model name with its first letter upper-cased
    pub fn display_name(&self) -> String {
        let mut chars = self.model_name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
