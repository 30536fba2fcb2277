//! Schema Registry - one build per model, shared afterwards
//!
//! The first request for a model builds its schema from the descriptor and the
//! storage engine's column metadata (or from a fresh cache entry). Concurrent
//! first requests are serialised per model by a `OnceCell`; a failed build
//! leaves the cell empty, so nothing broken is ever memoised or persisted.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use inflector::string::pluralize::to_plural;
use once_cell::sync::OnceCell;

use super::cache::{CacheEnvelope, SchemaCacheStore};
use super::descriptor::{KeyType, ModelDescriptor, RelationOptions};
use super::ModelSchema;
use crate::backends::StorageEngine;
use crate::config::DataMapperConfig;
use crate::error::{ConfigError, ModelResult};
use crate::relationships::{RelationDef, Relations, RelationshipType};

/// Built schemas and memoised join-table columns
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<String, Arc<OnceCell<Arc<ModelSchema>>>>,
    join_table_columns: DashMap<String, Arc<Vec<String>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already built schema, if any
    pub fn get(&self, model: &str) -> Option<Arc<ModelSchema>> {
        self.schemas
            .get(model)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn is_built(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    /// Return the schema for `descriptor.model`, building it on first use
    pub fn get_or_build(
        &self,
        descriptor: &ModelDescriptor,
        global: &DataMapperConfig,
        storage: &dyn StorageEngine,
        cache: Option<&dyn SchemaCacheStore>,
    ) -> ModelResult<Arc<ModelSchema>> {
        // clone the cell out so the map shard is not locked during the build
        let cell = self
            .schemas
            .entry(descriptor.model.clone())
            .or_default()
            .clone();

        cell.get_or_try_init(|| build_schema(descriptor, global, storage, cache).map(Arc::new))
            .cloned()
    }

    /// Columns of a many-to-many join table, described once per table
    pub fn join_table_columns(&self, table: &str, storage: &dyn StorageEngine) -> ModelResult<Arc<Vec<String>>> {
        if let Some(columns) = self.join_table_columns.get(table) {
            return Ok(columns.clone());
        }
        let columns: Vec<String> = storage
            .describe_columns(table)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        tracing::debug!(table, columns = columns.len(), "described join table");
        let columns = Arc::new(columns);
        self.join_table_columns.insert(table.to_string(), columns.clone());
        Ok(columns)
    }

    /// Forget every built schema
    pub fn clear(&self) {
        self.schemas.clear();
        self.join_table_columns.clear();
    }
}

/// Build a schema, preferring a fresh cache entry over the storage engine
pub fn build_schema(
    descriptor: &ModelDescriptor,
    global: &DataMapperConfig,
    storage: &dyn StorageEngine,
    cache: Option<&dyn SchemaCacheStore>,
) -> ModelResult<ModelSchema> {
    let model = descriptor.model.as_str();
    descriptor.check()?;
    let config = global.with_overrides(&descriptor.config)?;

    if let Some(cache) = cache {
        if let Some(schema) = load_cached(cache, model, &config) {
            return Ok(schema);
        }
    }

    let table_name = format!(
        "{}{}",
        config.prefix,
        descriptor
            .table
            .clone()
            .unwrap_or_else(|| to_plural(model))
    );

    let fields: Vec<String> = storage
        .describe_columns(&table_name)?
        .into_iter()
        .map(|column| column.name)
        .collect();

    let primary_keys = if descriptor.keys.is_empty() {
        IndexMap::from([("id".to_string(), KeyType::Integer)])
    } else {
        descriptor.keys.clone()
    };
    if let Some(key) = primary_keys.keys().find(|key| !fields.contains(key)) {
        return Err(ConfigError::MissingKeyField {
            model: model.to_string(),
            table: table_name.clone(),
            key: key.clone(),
        }
        .into());
    }

    let mut relations = Relations::default();
    for relationship_type in RelationshipType::ALL {
        for (name, options) in descriptor.relations(relationship_type) {
            let relation = build_relation(
                descriptor,
                &config,
                &table_name,
                &primary_keys,
                name,
                options,
                relationship_type,
            )?;
            relations
                .of_type_mut(relationship_type)
                .insert(name.clone(), relation);
        }
    }

    // every field gets an entry, keys get a coercing get rule
    let mut validation = IndexMap::new();
    for field in &fields {
        let mut rules = descriptor.validation.get(field).cloned().unwrap_or_default();
        if let Some(key_type) = primary_keys.get(field) {
            if rules.get_rules.is_empty() {
                if let Some(rule) = key_type.default_get_rule() {
                    rules.get_rules.push(rule.to_string());
                }
            }
        }
        validation.insert(field.clone(), rules);
    }
    for (field, rules) in &descriptor.validation {
        if !validation.contains_key(field) {
            validation.insert(field.clone(), rules.clone());
        }
    }

    let schema = ModelSchema {
        model_name: model.to_string(),
        table_name,
        primary_keys,
        fields,
        relations,
        validation,
        default_order_by: descriptor.default_order_by.clone(),
        config,
    };

    tracing::debug!(
        model,
        table = %schema.table_name,
        fields = schema.fields.len(),
        "built model schema"
    );

    if let Some(cache) = cache {
        let written = CacheEnvelope::new(schema.clone())
            .to_bytes()
            .and_then(|bytes| cache.save(model, &bytes));
        if let Err(e) = written {
            tracing::warn!(model, error = %e, "failed to write schema cache");
        }
    }

    Ok(schema)
}

fn load_cached(cache: &dyn SchemaCacheStore, model: &str, config: &DataMapperConfig) -> Option<ModelSchema> {
    let bytes = match cache.load(model) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(model, "schema cache miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(model, error = %e, "schema cache unreadable, rebuilding");
            return None;
        }
    };

    if let Some(max_age) = config.cache_max_age() {
        match cache.age(model) {
            Ok(Some(age)) if age <= max_age => {}
            Ok(age) => {
                tracing::debug!(model, age = ?age, max_age = ?max_age, "schema cache expired");
                return None;
            }
            Err(e) => {
                tracing::warn!(model, error = %e, "schema cache age unknown, rebuilding");
                return None;
            }
        }
    }

    match CacheEnvelope::from_bytes(&bytes) {
        Ok(envelope) if envelope.schema.model_name == model => {
            tracing::debug!(model, written_at = %envelope.written_at, "schema cache hit");
            Some(envelope.schema)
        }
        Ok(envelope) => {
            tracing::warn!(model, cached = %envelope.schema.model_name, "schema cache entry belongs to another model");
            None
        }
        Err(e) => {
            tracing::warn!(model, error = %e, "corrupt schema cache entry, rebuilding");
            None
        }
    }
}

fn build_relation(
    descriptor: &ModelDescriptor,
    config: &DataMapperConfig,
    table_name: &str,
    primary_keys: &IndexMap<String, KeyType>,
    name: &str,
    options: &RelationOptions,
    relationship_type: RelationshipType,
) -> Result<RelationDef, ConfigError> {
    let model = descriptor.model.as_str();
    let related_class = options
        .related_class
        .clone()
        .unwrap_or_else(|| name.to_string())
        .to_lowercase();
    let my_class = options.my_class.clone().unwrap_or_else(|| model.to_string());
    let my_key = options
        .my_key
        .clone()
        .unwrap_or_else(|| primary_keys.keys().cloned().collect());

    let related_key = match (relationship_type, &options.related_key) {
        (_, Some(keys)) => keys.clone(),
        (RelationshipType::BelongsTo, None) => Vec::new(),
        (_, None) => {
            return Err(ConfigError::invalid_relation(
                model,
                name,
                format!("{} relations must declare related_key", relationship_type),
            ))
        }
    };
    if relationship_type != RelationshipType::BelongsTo && related_key.len() != my_key.len() {
        return Err(ConfigError::invalid_relation(
            model,
            name,
            format!(
                "related_key has {} column(s) but my_key has {}",
                related_key.len(),
                my_key.len()
            ),
        ));
    }

    let join_table = options
        .join_table
        .clone()
        .unwrap_or_else(|| default_join_table(&config.join_prefix, &related_class, &my_class));

    Ok(RelationDef {
        name: name.to_string(),
        relationship_type,
        related_class,
        related_model: options.related_model.clone().unwrap_or_else(|| model.to_string()),
        my_table: options.my_table.clone().unwrap_or_else(|| table_name.to_string()),
        my_class,
        my_key,
        related_key,
        join_table,
        other_field: options.other_field.clone(),
        auto_populate: options.auto_populate,
        cascade_delete: options.cascade_delete.unwrap_or(config.cascade_delete),
    })
}

/// `join_prefix + plural(lower) + "_" + plural(higher)`, the same from both sides
pub fn default_join_table(join_prefix: &str, a: &str, b: &str) -> String {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    format!("{}{}_{}", join_prefix, to_plural(low), to_plural(high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_join_table_is_symmetric() {
        assert_eq!(default_join_table("", "order", "tag"), "orders_tags");
        assert_eq!(default_join_table("", "tag", "order"), "orders_tags");
        assert_eq!(default_join_table("j_", "tag", "order"), "j_orders_tags");
    }
}
