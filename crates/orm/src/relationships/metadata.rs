//! Relationship Metadata System - resolved relation definitions

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// One-to-one relationship, the other side holds the key
    HasOne,
    /// One-to-many relationship, or many-to-many when both sides are `HasMany`
    HasMany,
    /// Inverse side of `HasOne`/`HasMany`, this side holds the key
    BelongsTo,
}

impl RelationshipType {
    /// Lookup order used when a relation is searched by name
    pub const ALL: [RelationshipType; 3] = [
        RelationshipType::HasOne,
        RelationshipType::HasMany,
        RelationshipType::BelongsTo,
    ];

    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::HasOne => "has_one",
            RelationshipType::HasMany => "has_many",
            RelationshipType::BelongsTo => "belongs_to",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation as resolved by the schema registry; every default is filled in.
///
/// `my_key` and `related_key` are paired positionally. On a `has_one` or
/// `has_many` side `related_key` names the columns on the other side (the
/// related table, or the join table of a many-to-many relation) that point
/// back at `my_key`. On a `belongs_to` side it is usually empty: the key
/// columns are described by the inverse relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub relationship_type: RelationshipType,
    /// Model at the other end
    pub related_class: String,
    /// Name under which the owning model is aliased when this relation is
    /// joined from the other side
    pub related_model: String,
    pub my_class: String,
    pub my_table: String,
    pub my_key: Vec<String>,
    pub related_key: Vec<String>,
    /// Only consulted for many-to-many relations
    pub join_table: String,
    /// Name of the inverse relation on the related model, when it cannot be
    /// found by model name
    pub other_field: Option<String>,
    pub auto_populate: Option<bool>,
    pub cascade_delete: bool,
}

impl RelationDef {
    pub fn is_many_to_many_with(&self, other: &RelationDef) -> bool {
        self.relationship_type == RelationshipType::HasMany
            && other.relationship_type == RelationshipType::HasMany
    }
}

/// The three relation maps of a model, keyed by relation name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub has_one: IndexMap<String, RelationDef>,
    #[serde(default)]
    pub has_many: IndexMap<String, RelationDef>,
    #[serde(default)]
    pub belongs_to: IndexMap<String, RelationDef>,
}

impl Relations {
    pub fn of_type(&self, relationship_type: RelationshipType) -> &IndexMap<String, RelationDef> {
        match relationship_type {
            RelationshipType::HasOne => &self.has_one,
            RelationshipType::HasMany => &self.has_many,
            RelationshipType::BelongsTo => &self.belongs_to,
        }
    }

    pub fn of_type_mut(&mut self, relationship_type: RelationshipType) -> &mut IndexMap<String, RelationDef> {
        match relationship_type {
            RelationshipType::HasOne => &mut self.has_one,
            RelationshipType::HasMany => &mut self.has_many,
            RelationshipType::BelongsTo => &mut self.belongs_to,
        }
    }

    /// Every relation, has_one first, then has_many, then belongs_to
    pub fn iter(&self) -> impl Iterator<Item = &RelationDef> {
        RelationshipType::ALL
            .into_iter()
            .flat_map(move |t| self.of_type(t).values())
    }

    /// Relation declared under exactly `name`
    pub fn by_name(&self, name: &str) -> Option<&RelationDef> {
        RelationshipType::ALL
            .into_iter()
            .find_map(|t| self.of_type(t).get(name))
    }

    /// Relation by name, falling back to the first relation towards a model
    /// called `name`
    pub fn find(&self, name: &str) -> Option<&RelationDef> {
        self.by_name(name)
            .or_else(|| self.iter().find(|rel| rel.related_class == name))
    }

    pub fn is_empty(&self) -> bool {
        self.has_one.is_empty() && self.has_many.is_empty() && self.belongs_to.is_empty()
    }
}
