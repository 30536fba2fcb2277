//! Schema Registry - model descriptors, built schemas and their cache

pub mod cache;
pub mod descriptor;
pub mod model_schema;
pub mod registry;

pub use cache::{CacheEnvelope, FileSchemaCache, SchemaCacheStore};
pub use descriptor::{FieldValidation, KeyType, ModelDescriptor, RelationOptions};
pub use model_schema::ModelSchema;
pub use registry::{build_schema, default_join_table, SchemaRegistry};
