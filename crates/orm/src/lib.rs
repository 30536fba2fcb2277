//! # datamapper-orm: Query-building and relationship-resolution core
//!
//! A DataMapper-style ORM core. Models are described declaratively, their
//! schemas are built lazily against a storage engine, and every model
//! instance doubles as a fluent query builder over its own table.
//!
//! Relations (`has_one`, `has_many`, `belongs_to`, and many-to-many through a
//! join table) are resolved into LEFT OUTER JOINs using stable per-model table
//! aliases, so nested and repeated joins never collide. Result rows are mapped
//! back onto instances, with related objects instantiated straight from the
//! joined columns on request.
//!
//! The crate never opens connections: SQL goes out through a
//! [`StorageEngine`] supplied by the caller.

pub mod alias;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod hydration;
pub mod localization;
pub mod model;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod validation;

#[cfg(test)]
mod tests;

// Re-export core traits and types
pub use alias::{AliasAllocator, PARENT_PLACEHOLDER};
pub use backends::{ColumnInfo, DatabaseBackendType, QueryResult, ResultRow, StorageEngine};
pub use config::DataMapperConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::*;
pub use localization::{Localizer, StaticLocalizer};
pub use model::{InstanceFlags, ModelInstance, ParentLink, Property, ResultIter, ResultKey};
pub use query::{FuncArg, LikeSide, OrderDirection, QueryBuilder};
pub use relationships::{RelationDef, RelationPath, RelationStep, RelationshipType};
pub use schema::{
    FieldValidation, FileSchemaCache, KeyType, ModelDescriptor, ModelSchema, RelationOptions, SchemaCacheStore,
    SchemaRegistry,
};
pub use validation::{GetRuleHandler, ValidationHook};
