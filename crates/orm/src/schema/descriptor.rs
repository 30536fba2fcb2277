//! Declarative model descriptors
//!
//! A descriptor is what a model author writes down: table, keys, relations,
//! validation metadata and configuration overrides. The schema registry turns
//! it into a [`ModelSchema`](super::ModelSchema) once the table's columns are
//! known.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::is_config_key;
use crate::error::ConfigError;
use crate::query::OrderDirection;
use crate::relationships::RelationshipType;

/// Value type of a primary key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Integer,
    Float,
    String,
}

impl KeyType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "integer" | "int" => Some(KeyType::Integer),
            "float" | "double" => Some(KeyType::Float),
            "string" => Some(KeyType::String),
            _ => None,
        }
    }

    /// Get rule applied to keys of this type when none is declared
    pub fn default_get_rule(self) -> Option<&'static str> {
        match self {
            KeyType::Integer => Some("intval"),
            KeyType::Float => Some("floatval"),
            KeyType::String => None,
        }
    }
}

/// Options of a single declared relation, unset options take their defaults
/// when the schema is built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationOptions {
    pub related_class: Option<String>,
    pub related_model: Option<String>,
    pub other_field: Option<String>,
    pub related_key: Option<Vec<String>>,
    pub my_key: Option<Vec<String>>,
    pub my_class: Option<String>,
    pub my_table: Option<String>,
    pub join_table: Option<String>,
    pub auto_populate: Option<bool>,
    pub cascade_delete: Option<bool>,
}

impl RelationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn related_class(mut self, class: impl Into<String>) -> Self {
        self.related_class = Some(class.into());
        self
    }

    pub fn related_model(mut self, model: impl Into<String>) -> Self {
        self.related_model = Some(model.into());
        self
    }

    pub fn other_field(mut self, field: impl Into<String>) -> Self {
        self.other_field = Some(field.into());
        self
    }

    pub fn related_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_key = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn my_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.my_key = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn my_class(mut self, class: impl Into<String>) -> Self {
        self.my_class = Some(class.into());
        self
    }

    pub fn my_table(mut self, table: impl Into<String>) -> Self {
        self.my_table = Some(table.into());
        self
    }

    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    pub fn auto_populate(mut self, auto_populate: bool) -> Self {
        self.auto_populate = Some(auto_populate);
        self
    }

    pub fn cascade_delete(mut self, cascade_delete: bool) -> Self {
        self.cascade_delete = Some(cascade_delete);
        self
    }

    fn from_json(model: &str, relation: &str, value: &Value) -> Result<Self, ConfigError> {
        let props = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(props) => props,
            _ => {
                return Err(ConfigError::invalid_relation(
                    model,
                    relation,
                    "expected a mapping of relation properties",
                ))
            }
        };

        let mut options = Self::default();
        for (key, value) in props {
            let invalid = |expected: &str| {
                ConfigError::invalid_relation(model, relation, format!("'{}' must be {}", key, expected))
            };
            match key.as_str() {
                "related_class" | "class" => options.related_class = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "related_model" => options.related_model = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "other_field" => options.other_field = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "my_class" => options.my_class = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "my_table" => options.my_table = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "join_table" => options.join_table = Some(text(value).ok_or_else(|| invalid("a string"))?),
                "related_key" => {
                    options.related_key = Some(text_list(value).ok_or_else(|| invalid("a string or a list of strings"))?)
                }
                "my_key" => options.my_key = Some(text_list(value).ok_or_else(|| invalid("a string or a list of strings"))?),
                "auto_populate" => options.auto_populate = Some(value.as_bool().ok_or_else(|| invalid("a boolean"))?),
                "cascade_delete" => options.cascade_delete = Some(value.as_bool().ok_or_else(|| invalid("a boolean"))?),
                _ => {
                    return Err(ConfigError::invalid_relation(
                        model,
                        relation,
                        format!("unknown relation property '{}'", key),
                    ))
                }
            }
        }
        Ok(options)
    }
}

/// Validation metadata of one field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Display label, or `lang:<key>` to look it up at call time
    #[serde(default)]
    pub label: Option<String>,
    /// Save rules, executed by the validation collaborator
    #[serde(default)]
    pub rules: Vec<String>,
    /// Transforms applied to fetched values
    #[serde(default)]
    pub get_rules: Vec<String>,
    /// Field whose value this field mirrors after a fetch
    #[serde(default)]
    pub matches: Option<String>,
}

impl FieldValidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn get_rule(mut self, rule: impl Into<String>) -> Self {
        self.get_rules.push(rule.into());
        self
    }

    pub fn matches(mut self, field: impl Into<String>) -> Self {
        self.matches = Some(field.into());
        self
    }
}

/// Declarative description of a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub model: String,
    pub table: Option<String>,
    /// Primary keys in order; empty means `{id: integer}`
    pub keys: IndexMap<String, KeyType>,
    pub has_one: IndexMap<String, RelationOptions>,
    pub has_many: IndexMap<String, RelationOptions>,
    pub belongs_to: IndexMap<String, RelationOptions>,
    pub validation: IndexMap<String, FieldValidation>,
    pub default_order_by: Vec<(String, Option<OrderDirection>)>,
    /// Per-model configuration overrides
    pub config: Map<String, Value>,
}

impl ModelDescriptor {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into().to_lowercase(),
            table: None,
            keys: IndexMap::new(),
            has_one: IndexMap::new(),
            has_many: IndexMap::new(),
            belongs_to: IndexMap::new(),
            validation: IndexMap::new(),
            default_order_by: Vec::new(),
            config: Map::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn primary_key(mut self, name: impl Into<String>, key_type: KeyType) -> Self {
        self.keys.insert(name.into(), key_type);
        self
    }

    pub fn has_one(mut self, name: impl Into<String>, options: RelationOptions) -> Self {
        self.has_one.insert(name.into(), options);
        self
    }

    pub fn has_many(mut self, name: impl Into<String>, options: RelationOptions) -> Self {
        self.has_many.insert(name.into(), options);
        self
    }

    pub fn belongs_to(mut self, name: impl Into<String>, options: RelationOptions) -> Self {
        self.belongs_to.insert(name.into(), options);
        self
    }

    pub fn validate(mut self, field: impl Into<String>, validation: FieldValidation) -> Self {
        self.validation.insert(field.into(), validation);
        self
    }

    pub fn default_order_by(mut self, field: impl Into<String>, direction: Option<OrderDirection>) -> Self {
        self.default_order_by.push((field.into(), direction));
        self
    }

    pub fn config_override(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn relations(&self, relationship_type: RelationshipType) -> &IndexMap<String, RelationOptions> {
        match relationship_type {
            RelationshipType::HasOne => &self.has_one,
            RelationshipType::HasMany => &self.has_many,
            RelationshipType::BelongsTo => &self.belongs_to,
        }
    }

    /// Check the parts of a descriptor that do not need the table's columns
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid_value("model", "", "a non-empty model name"));
        }
        if let Some(key) = self.config.keys().find(|key| !is_config_key(key)) {
            return Err(ConfigError::unknown_key(key.clone()));
        }
        Ok(())
    }

    /// Parse the declarative JSON form:
    ///
    /// ```json
    /// {
    ///   "model": "order",
    ///   "table": "orders",
    ///   "keys": {"id": "integer"},
    ///   "has_many": {"item": {"related_key": "order_id"}},
    ///   "belongs_to": ["customer"],
    ///   "validation": {"name": {"label": "Name", "rules": ["required"]}},
    ///   "default_order_by": {"created": "desc"},
    ///   "auto_populate_has_many": true
    /// }
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid_type("descriptor", "an object"))?;
        let model = object
            .get("model")
            .and_then(text)
            .ok_or_else(|| ConfigError::invalid_type("model", "a string value"))?;
        let mut descriptor = Self::new(model);

        for (key, value) in object {
            match key.as_str() {
                "model" => {}
                "table" => {
                    descriptor.table = Some(text(value).ok_or_else(|| ConfigError::invalid_type("table", "a string value"))?)
                }
                "keys" => descriptor.keys = parse_keys(value)?,
                "has_one" => descriptor.has_one = parse_relations(&descriptor.model, value)?,
                "has_many" => descriptor.has_many = parse_relations(&descriptor.model, value)?,
                "belongs_to" => descriptor.belongs_to = parse_relations(&descriptor.model, value)?,
                "validation" => descriptor.validation = parse_validation(value)?,
                "default_order_by" => descriptor.default_order_by = parse_order(value)?,
                key if is_config_key(key) => {
                    descriptor.config.insert(key.to_string(), value.clone());
                }
                _ => return Err(ConfigError::unknown_key(key.clone())),
            }
        }

        Ok(descriptor)
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items.iter().map(text).collect(),
        _ => None,
    }
}

fn parse_keys(value: &Value) -> Result<IndexMap<String, KeyType>, ConfigError> {
    let invalid = || ConfigError::invalid_type("keys", "a mapping of key name to integer, float or string");
    match value {
        Value::Object(keys) => keys
            .iter()
            .map(|(name, key_type)| {
                let key_type = key_type.as_str().and_then(KeyType::parse).ok_or_else(invalid)?;
                Ok((name.clone(), key_type))
            })
            .collect(),
        // a bare list of names declares integer keys
        Value::Array(names) => names
            .iter()
            .map(|name| text(name).map(|n| (n, KeyType::Integer)).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn parse_relations(model: &str, value: &Value) -> Result<IndexMap<String, RelationOptions>, ConfigError> {
    let mut relations = IndexMap::new();
    match value {
        Value::Object(entries) => {
            for (name, props) in entries {
                relations.insert(name.clone(), RelationOptions::from_json(model, name, props)?);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let name = text(entry).ok_or_else(|| {
                    ConfigError::invalid_relation(model, entry.to_string(), "expected a relation name")
                })?;
                relations.insert(name, RelationOptions::default());
            }
        }
        other => {
            return Err(ConfigError::invalid_relation(
                model,
                other.to_string(),
                "expected a name to properties mapping",
            ))
        }
    }
    Ok(relations)
}

fn parse_validation(value: &Value) -> Result<IndexMap<String, FieldValidation>, ConfigError> {
    let entries = value
        .as_object()
        .ok_or_else(|| ConfigError::invalid_type("validation", "a mapping of field name to rules"))?;
    entries
        .iter()
        .map(|(field, rules)| {
            let validation: FieldValidation = serde_json::from_value(rules.clone()).map_err(|e| {
                ConfigError::invalid_value(format!("validation.{}", field), e.to_string(), "label, rules, get_rules, matches")
            })?;
            Ok((field.clone(), validation))
        })
        .collect()
}

fn parse_order(value: &Value) -> Result<Vec<(String, Option<OrderDirection>)>, ConfigError> {
    let invalid = |v: &Value| ConfigError::invalid_value("default_order_by", v.to_string(), "field names or field to direction pairs");
    match value {
        Value::String(field) => Ok(vec![(field.clone(), None)]),
        Value::Array(fields) => fields
            .iter()
            .map(|field| text(field).map(|f| (f, None)).ok_or_else(|| invalid(field)))
            .collect(),
        Value::Object(pairs) => pairs
            .iter()
            .map(|(field, direction)| {
                let direction = direction
                    .as_str()
                    .and_then(OrderDirection::parse)
                    .ok_or_else(|| invalid(direction))?;
                Ok((field.clone(), Some(direction)))
            })
            .collect(),
        other => Err(invalid(other)),
    }
}
