//! The engine: storage handle, configuration and every shared registry
//!
//! One engine is built per process (or per test) and handed to every model
//! instance it creates. Cloning an engine is cheap and clones share state.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::alias::AliasAllocator;
use crate::backends::StorageEngine;
use crate::config::DataMapperConfig;
use crate::error::{ModelError, ModelResult, QueryError};
use crate::localization::Localizer;
use crate::model::ModelInstance;
use crate::schema::{FileSchemaCache, ModelDescriptor, ModelSchema, SchemaCacheStore, SchemaRegistry};
use crate::validation::GetRuleHandler;

struct EngineInner {
    storage: Arc<dyn StorageEngine>,
    config: DataMapperConfig,
    descriptors: DashMap<String, ModelDescriptor>,
    registry: SchemaRegistry,
    aliases: AliasAllocator,
    cache: Option<Arc<dyn SchemaCacheStore>>,
    localizer: Option<Arc<dyn Localizer>>,
    get_rules: Option<Arc<dyn GetRuleHandler>>,
}

/// Shared registry of models, schemas and aliases
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.inner.storage.backend_type())
            .field("models", &self.inner.descriptors.len())
            .field("aliases", &self.inner.aliases.len())
            .field("cache", &self.inner.cache.is_some())
            .finish()
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    storage: Arc<dyn StorageEngine>,
    config: DataMapperConfig,
    cache: Option<Arc<dyn SchemaCacheStore>>,
    localizer: Option<Arc<dyn Localizer>>,
    get_rules: Option<Arc<dyn GetRuleHandler>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: DataMapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache_store(mut self, cache: Arc<dyn SchemaCacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    pub fn get_rule_handler(mut self, handler: Arc<dyn GetRuleHandler>) -> Self {
        self.get_rules = Some(handler);
        self
    }

    pub fn build(self) -> Engine {
        let cache = self.cache.or_else(|| {
            self.config
                .cache_path
                .as_ref()
                .map(|path| Arc::new(FileSchemaCache::new(path.clone())) as Arc<dyn SchemaCacheStore>)
        });

        Engine {
            inner: Arc::new(EngineInner {
                storage: self.storage,
                config: self.config,
                descriptors: DashMap::new(),
                registry: SchemaRegistry::new(),
                aliases: AliasAllocator::new(),
                cache,
                localizer: self.localizer,
                get_rules: self.get_rules,
            }),
        }
    }
}

impl Engine {
    pub fn builder(storage: Arc<dyn StorageEngine>) -> EngineBuilder {
        EngineBuilder {
            storage,
            config: DataMapperConfig::default(),
            cache: None,
            localizer: None,
            get_rules: None,
        }
    }

    /// Engine with default configuration and no collaborators
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self::builder(storage).build()
    }

    /// Add (or replace) a model descriptor. The schema itself is built on
    /// first use.
    pub fn register(&self, descriptor: ModelDescriptor) -> ModelResult<()> {
        descriptor.check()?;
        if self.inner.registry.is_built(&descriptor.model) {
            tracing::warn!(model = %descriptor.model, "model re-registered after its schema was built");
        }
        tracing::debug!(model = %descriptor.model, "registered model");
        self.inner.descriptors.insert(descriptor.model.clone(), descriptor);
        Ok(())
    }

    /// Parse and register a JSON descriptor
    pub fn register_json(&self, descriptor: &Value) -> ModelResult<()> {
        self.register(ModelDescriptor::from_json(descriptor)?)
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.inner.descriptors.contains_key(&model.to_lowercase())
    }

    /// The shared schema of `model`, built on first use
    pub fn schema(&self, model: &str) -> ModelResult<Arc<ModelSchema>> {
        let model = model.to_lowercase();
        if let Some(schema) = self.inner.registry.get(&model) {
            return Ok(schema);
        }

        let descriptor = self
            .inner
            .descriptors
            .get(&model)
            .map(|d| d.value().clone())
            .ok_or_else(|| ModelError::NotFound(model.clone()))?;

        let schema = self.inner.registry.get_or_build(
            &descriptor,
            &self.inner.config,
            self.inner.storage.as_ref(),
            self.inner.cache.as_deref(),
        )?;
        self.inner.aliases.alias_for(&schema.model_name);
        Ok(schema)
    }

    /// A fresh, empty instance of `model`
    pub fn model(&self, model: &str) -> ModelResult<ModelInstance> {
        let schema = self.schema(model)?;
        Ok(ModelInstance::new(self.clone(), schema))
    }

    /// Load an instance by primary key, keys in declaration order
    pub fn find(&self, model: &str, keys: &[Value]) -> ModelResult<ModelInstance> {
        let mut instance = self.model(model)?;
        let key_names = instance.schema().key_names();
        if key_names.len() != keys.len() {
            return Err(QueryError::InvalidParameter(format!(
                "'{}' has {} primary key column(s), {} value(s) given",
                instance.model_name(),
                key_names.len(),
                keys.len()
            ))
            .into());
        }
        for (name, value) in key_names.iter().zip(keys) {
            instance.where_eq(name, value.clone());
        }
        instance.get()?;
        Ok(instance)
    }

    /// Columns of a join table, looked up once
    pub fn join_table_columns(&self, table: &str) -> ModelResult<Arc<Vec<String>>> {
        self.inner
            .registry
            .join_table_columns(table, self.inner.storage.as_ref())
    }

    pub fn storage(&self) -> &dyn StorageEngine {
        self.inner.storage.as_ref()
    }

    pub fn config(&self) -> &DataMapperConfig {
        &self.inner.config
    }

    pub fn aliases(&self) -> &AliasAllocator {
        &self.inner.aliases
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    pub fn localizer(&self) -> Option<&dyn Localizer> {
        self.inner.localizer.as_deref()
    }

    pub fn get_rule_handler(&self) -> Option<&dyn GetRuleHandler> {
        self.inner.get_rules.as_deref()
    }

    /// Stable alias of a model or join table
    pub fn alias_for(&self, name: &str) -> String {
        self.inner.aliases.alias_for(name)
    }

    /// [`Engine::alias_for`], quoted for the storage engine
    pub fn protected_alias_for(&self, name: &str) -> String {
        self.inner.aliases.protected_alias_for(name, self.storage())
    }

    /// Quote an identifier in the storage engine's convention
    pub fn quote(&self, identifier: &str) -> String {
        self.inner.storage.quote_identifier(identifier)
    }
}
