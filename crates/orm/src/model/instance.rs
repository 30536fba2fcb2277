//! Model instance state: field values, relations, results and flags

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use inflector::string::pluralize::to_plural;
use inflector::string::singularize::to_singular;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::Engine;
use crate::error::{ModelError, ModelResult};
use crate::localization::expand_template;
use crate::query::QueryBuilder;
use crate::schema::ModelSchema;
use crate::validation::{string_value, truthy, ValidationHook};

/// Index of an entry in the result collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKey {
    /// Row position
    Position(usize),
    /// Primary key value, when results are indexed by key
    Key(String),
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKey::Position(i) => write!(f, "{}", i),
            ResultKey::Key(key) => f.write_str(key),
        }
    }
}

/// How an instance was reached from its parent
///
/// The link is a snapshot of the parent taken each time the child is looked
/// up through the parent, so it always reflects the parent's latest values.
#[derive(Debug, Clone)]
pub struct ParentLink {
    /// Relation name on the parent
    pub relation: String,
    pub schema: Arc<ModelSchema>,
    pub alias: String,
    /// The parent's current values
    pub values: IndexMap<String, Value>,
    pub exists: bool,
    pub parent: Option<Box<ParentLink>>,
}

impl ParentLink {
    pub fn value(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }
}

/// A related column waiting to be moved into an eagerly instantiated object
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    /// Field on the related object
    pub field: String,
    /// Column of the result row holding its value
    pub column: String,
}

/// Transient per-instance flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFlags {
    pub validated: bool,
    pub valid: bool,
    pub include_join_fields: bool,
    pub auto_populate_has_many: Option<bool>,
    pub auto_populate_has_one: Option<bool>,
}

/// Result of a property lookup
#[derive(Debug)]
pub enum Property<'a> {
    Value(&'a Value),
    Related(&'a mut ModelInstance),
    Null,
}

impl<'a> Property<'a> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Property::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_related(self) -> Option<&'a mut ModelInstance> {
        match self {
            Property::Related(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Property::Null)
    }
}

/// One model object plus the query being built against its table
#[derive(Clone)]
pub struct ModelInstance {
    pub(crate) engine: Engine,
    pub(crate) schema: Arc<ModelSchema>,
    pub(crate) alias: String,
    pub(crate) current: IndexMap<String, Value>,
    pub(crate) original: IndexMap<String, Value>,
    pub(crate) related: IndexMap<String, ModelInstance>,
    pub(crate) all: IndexMap<ResultKey, ModelInstance>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) flags: InstanceFlags,
    pub(crate) query: QueryBuilder,
    /// Eager instantiation requests, keyed by relation path joined with `*`
    pub(crate) instantiations: IndexMap<String, Vec<Instantiation>>,
}

impl ModelInstance {
    pub(crate) fn new(engine: Engine, schema: Arc<ModelSchema>) -> Self {
        let alias = engine.alias_for(&schema.model_name);
        let current: IndexMap<String, Value> = schema
            .fields
            .iter()
            .map(|f| (f.clone(), Value::Null))
            .collect();
        Self {
            engine,
            alias,
            original: current.clone(),
            current,
            schema,
            related: IndexMap::new(),
            all: IndexMap::new(),
            parent: None,
            flags: InstanceFlags::default(),
            query: QueryBuilder::new(),
            instantiations: IndexMap::new(),
        }
    }

    /// A new empty instance of the same model, sharing nothing but the schema
    pub(crate) fn sibling(&self) -> Self {
        Self::new(self.engine.clone(), Arc::clone(&self.schema))
    }

    pub fn model_name(&self) -> &str {
        &self.schema.model_name
    }

    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    /// Alias of this model's table in generated SQL
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Clauses accumulated so far
    pub fn query_builder(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn parent_link(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    pub fn flags(&self) -> &InstanceFlags {
        &self.flags
    }

    /// Current value of `field`, `None` if it was never set or fetched
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.current.get(field)
    }

    /// Value as of the last fetch
    pub fn original_value(&self, field: &str) -> Option<&Value> {
        self.original.get(field)
    }

    /// Deserialize a field; `Ok(None)` when unset or null
    pub fn field<T: DeserializeOwned>(&self, field: &str) -> ModelResult<Option<T>> {
        match self.current.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                ModelError::Serialization(format!("Failed to deserialize field '{}': {}", field, e))
            }),
        }
    }

    /// Store a value; names outside the schema are carried as they are
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.current.insert(field.to_string(), value.into());
        self
    }

    /// Fields whose current value differs from the last fetched one
    pub fn changed_fields(&self) -> Vec<&str> {
        self.current
            .iter()
            .filter(|(field, value)| self.original.get(*field).unwrap_or(&Value::Null) != *value)
            .map(|(field, _)| field.as_str())
            .collect()
    }

    /// Property lookup: a non-null value, then a relation (created on first
    /// access), then an already materialised singular relation, else null
    pub fn property(&mut self, name: &str) -> ModelResult<Property<'_>> {
        if self.current.get(name).map_or(false, |v| !v.is_null()) {
            return Ok(Property::Value(&self.current[name]));
        }

        if self.relation_name(name).is_some() {
            return Ok(Property::Related(self.related(name)?));
        }

        let singular = to_singular(name);
        if singular != name {
            if let Some(related) = self.related.get_mut(&singular) {
                return Ok(Property::Related(related));
            }
        }

        Ok(Property::Null)
    }

    /// Declared relation name for `name`, accepting singular and plural forms
    pub(crate) fn relation_name(&self, name: &str) -> Option<String> {
        let relations = &self.schema.relations;
        relations
            .by_name(name)
            .or_else(|| relations.by_name(&to_plural(name)))
            .or_else(|| relations.by_name(&to_singular(name)))
            .or_else(|| relations.find(name))
            .map(|rel| rel.name.clone())
    }

    /// Primary key values in declaration order, null when unset
    pub fn key_values(&self) -> Vec<Value> {
        self.schema
            .primary_keys
            .keys()
            .map(|k| self.current.get(k).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// True if every primary key holds a non-empty value, or the last fetch
    /// returned rows
    pub fn exists(&self) -> bool {
        let keys_set = !self.schema.primary_keys.is_empty()
            && self
                .schema
                .primary_keys
                .keys()
                .all(|k| self.current.get(k).map_or(false, truthy));
        keys_set || !self.all.is_empty()
    }

    /// Result collection of the last fetch; the first entry mirrors `self`
    pub fn all(&self) -> &IndexMap<ResultKey, ModelInstance> {
        &self.all
    }

    pub fn all_mut(&mut self) -> &mut IndexMap<ResultKey, ModelInstance> {
        &mut self.all
    }

    pub fn result_count(&self) -> usize {
        self.all.len()
    }

    /// Forget fetched data: every field back to null, related objects and the
    /// result collection dropped. The parent link and the pending query stay.
    pub fn clear(&mut self) -> &mut Self {
        self.all.clear();
        self.related.clear();
        self.current = self
            .schema
            .fields
            .iter()
            .map(|f| (f.clone(), Value::Null))
            .collect();
        self.original = self.current.clone();
        self.flags.validated = false;
        self.flags.valid = false;
        self
    }

    /// Deep copy, pending query included
    pub fn get_clone(&self) -> Self {
        self.clone()
    }

    /// Deep copy that does not exist: primary keys are cleared and the result
    /// collection is dropped
    pub fn get_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.all.clear();
        for key in self.schema.primary_keys.keys() {
            copy.current.insert(key.clone(), Value::Null);
        }
        copy
    }

    /// Drop result entries that no longer exist. Returns whether anything was
    /// in the collection beforehand.
    pub fn refresh_all(&mut self) -> bool {
        let had_entries = !self.all.is_empty();
        self.all.retain(|_, item| item.exists());
        had_entries
    }

    /// Display label of a field, resolved now so locale changes apply
    pub fn label(&self, field: &str) -> String {
        let localizer = self.engine.localizer();
        let declared = self
            .schema
            .validation
            .get(field)
            .and_then(|v| v.label.as_deref());

        match declared {
            Some(label) => match label.strip_prefix("lang:") {
                Some(key) => localizer
                    .and_then(|l| l.lookup(key))
                    .unwrap_or_else(|| field.to_string()),
                None => label.to_string(),
            },
            None => {
                let key = expand_template(
                    &self.schema.config.field_label_lang_format,
                    &self.schema.model_name,
                    &self.schema.table_name,
                    field,
                );
                localizer
                    .and_then(|l| l.lookup(&key))
                    .unwrap_or_else(|| field.to_string())
            }
        }
    }

    pub fn is_validated(&self) -> bool {
        self.flags.validated
    }

    pub fn is_valid(&self) -> bool {
        self.flags.valid
    }

    /// Run an external validation and record the outcome
    pub fn validate_with(&mut self, hook: &dyn ValidationHook) -> ModelResult<bool> {
        let valid = hook.validate(self)?;
        self.flags.validated = true;
        self.flags.valid = valid;
        Ok(valid)
    }

    /// Override `auto_populate_has_many` for this instance
    pub fn auto_populate_has_many(&mut self, enabled: bool) -> &mut Self {
        self.flags.auto_populate_has_many = Some(enabled);
        self
    }

    /// Override `auto_populate_has_one` for this instance
    pub fn auto_populate_has_one(&mut self, enabled: bool) -> &mut Self {
        self.flags.auto_populate_has_one = Some(enabled);
        self
    }

    /// Snapshot handed to a related child
    pub(crate) fn link_for(&self, relation: &str) -> ParentLink {
        ParentLink {
            relation: relation.to_string(),
            schema: Arc::clone(&self.schema),
            alias: self.alias.clone(),
            values: self.current.clone(),
            exists: self.exists(),
            parent: self.parent.clone().map(Box::new),
        }
    }

    /// Key of this instance in a keyed result collection
    pub(crate) fn result_key(&self, position: usize, keyed: bool) -> ResultKey {
        if keyed {
            if let Some(key) = self.schema.primary_keys.keys().next() {
                if let Some(value) = self.current.get(key).filter(|v| !v.is_null()) {
                    return ResultKey::Key(string_value(value));
                }
            }
        }
        ResultKey::Position(position)
    }

    /// Copy current values into the original snapshot
    pub(crate) fn sync_original(&mut self) {
        self.original = self.current.clone();
    }
}

impl fmt::Display for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.schema.display_name())
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &self.schema.model_name)
            .field("alias", &self.alias)
            .field("current", &self.current)
            .field("related", &self.related.keys().collect::<Vec<_>>())
            .field("results", &self.all.len())
            .field("parent", &self.parent.as_ref().map(|p| &p.relation))
            .finish()
    }
}
