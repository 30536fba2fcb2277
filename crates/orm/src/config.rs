//! Global and per-model configuration
//!
//! The engine holds one global `DataMapperConfig`. Each model descriptor may
//! override any of its keys; the resolved per-model configuration is the global
//! one with those overrides applied. Every override is checked against the known
//! key set and the key's declared type.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Declared type of a configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKind {
    Text,
    Flag,
    Integer,
    Directory,
    Seconds,
    OptionalText,
}

const CONFIG_KEYS: &[(&str, ConfigKind)] = &[
    ("prefix", ConfigKind::Text),
    ("join_prefix", ConfigKind::Text),
    ("error_prefix", ConfigKind::Text),
    ("error_suffix", ConfigKind::Text),
    ("model_prefix", ConfigKind::Text),
    ("model_suffix", ConfigKind::Text),
    ("created_field", ConfigKind::Text),
    ("updated_field", ConfigKind::Text),
    ("delete_field", ConfigKind::Text),
    ("timestamp_format", ConfigKind::Text),
    ("lang_file_format", ConfigKind::Text),
    ("field_label_lang_format", ConfigKind::Text),
    ("delete_uses_timestamp", ConfigKind::Flag),
    ("local_time", ConfigKind::Flag),
    ("unix_timestamp", ConfigKind::Flag),
    ("auto_transaction", ConfigKind::Flag),
    ("auto_populate_has_many", ConfigKind::Flag),
    ("auto_populate_has_one", ConfigKind::Flag),
    ("all_array_uses_keys", ConfigKind::Flag),
    ("cascade_delete", ConfigKind::Flag),
    ("free_result_threshold", ConfigKind::Integer),
    ("cache_path", ConfigKind::Directory),
    ("cache_expiration", ConfigKind::Seconds),
    ("db_params", ConfigKind::OptionalText),
];

/// Returns true if `key` names a configuration option
pub fn is_config_key(key: &str) -> bool {
    CONFIG_KEYS.iter().any(|(name, _)| *name == key)
}

/// Resolved configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMapperConfig {
    pub prefix: String,
    pub join_prefix: String,
    pub error_prefix: String,
    pub error_suffix: String,
    pub model_prefix: String,
    pub model_suffix: String,
    pub created_field: String,
    pub updated_field: String,
    pub delete_field: String,
    pub delete_uses_timestamp: bool,
    pub local_time: bool,
    pub unix_timestamp: bool,
    pub timestamp_format: String,
    pub lang_file_format: String,
    pub field_label_lang_format: String,
    pub auto_transaction: bool,
    pub auto_populate_has_many: bool,
    pub auto_populate_has_one: bool,
    pub all_array_uses_keys: bool,
    pub db_params: Option<String>,
    pub cache_path: Option<PathBuf>,
    /// Maximum age of a cached schema in seconds, 0 means never expire
    pub cache_expiration: u64,
    pub cascade_delete: bool,
    /// Result sets with more rows than this are released after mapping
    pub free_result_threshold: usize,
}

impl Default for DataMapperConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            join_prefix: String::new(),
            error_prefix: "<p>".to_string(),
            error_suffix: "</p>".to_string(),
            model_prefix: String::new(),
            model_suffix: String::new(),
            created_field: "created".to_string(),
            updated_field: "updated".to_string(),
            delete_field: "deleted".to_string(),
            delete_uses_timestamp: false,
            local_time: false,
            unix_timestamp: true,
            timestamp_format: String::new(),
            lang_file_format: "model_${model}".to_string(),
            field_label_lang_format: "${model}_${field}".to_string(),
            auto_transaction: false,
            auto_populate_has_many: false,
            auto_populate_has_one: false,
            all_array_uses_keys: false,
            db_params: None,
            cache_path: None,
            cache_expiration: 0,
            cascade_delete: true,
            free_result_threshold: 100,
        }
    }
}

impl DataMapperConfig {
    /// Parse a global configuration document, starting from the defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            ConfigError::invalid_value("configuration", e.to_string(), "a JSON object")
        })?;
        let overrides = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid_type("configuration", "an object"))?;

        let mut config = Self::default();
        config.apply_overrides(overrides)?;
        Ok(config)
    }

    /// Return a copy of this configuration with `overrides` applied
    pub fn with_overrides(&self, overrides: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut config = self.clone();
        config.apply_overrides(overrides)?;
        Ok(config)
    }

    /// Validate and apply each override in turn
    pub fn apply_overrides(&mut self, overrides: &Map<String, Value>) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            self.apply(key, value)?;
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let kind = CONFIG_KEYS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ConfigError::unknown_key(key))?;

        match kind {
            ConfigKind::Text => {
                let text = expect_text(key, value)?;
                *self.text_slot(key) = text;
            }
            ConfigKind::Flag => {
                let flag = value
                    .as_bool()
                    .ok_or_else(|| ConfigError::invalid_type(key, "a boolean value"))?;
                *self.flag_slot(key) = flag;
            }
            ConfigKind::Integer => {
                self.free_result_threshold = expect_unsigned(key, value, "an integer value")? as usize;
            }
            ConfigKind::Seconds => {
                self.cache_expiration = expect_unsigned(key, value, "an integer value >= 0")?;
            }
            ConfigKind::Directory => {
                self.cache_path = expect_directory(key, value)?;
            }
            ConfigKind::OptionalText => {
                self.db_params = match value {
                    Value::Null | Value::Bool(false) => None,
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    _ => {
                        return Err(ConfigError::invalid_type(
                            key,
                            "null, false or a non-empty string",
                        ))
                    }
                };
            }
        }
        Ok(())
    }

    fn text_slot(&mut self, key: &str) -> &mut String {
        match key {
            "prefix" => &mut self.prefix,
            "join_prefix" => &mut self.join_prefix,
            "error_prefix" => &mut self.error_prefix,
            "error_suffix" => &mut self.error_suffix,
            "model_prefix" => &mut self.model_prefix,
            "model_suffix" => &mut self.model_suffix,
            "created_field" => &mut self.created_field,
            "updated_field" => &mut self.updated_field,
            "delete_field" => &mut self.delete_field,
            "timestamp_format" => &mut self.timestamp_format,
            "lang_file_format" => &mut self.lang_file_format,
            _ => &mut self.field_label_lang_format,
        }
    }

    fn flag_slot(&mut self, key: &str) -> &mut bool {
        match key {
            "delete_uses_timestamp" => &mut self.delete_uses_timestamp,
            "local_time" => &mut self.local_time,
            "unix_timestamp" => &mut self.unix_timestamp,
            "auto_transaction" => &mut self.auto_transaction,
            "auto_populate_has_many" => &mut self.auto_populate_has_many,
            "auto_populate_has_one" => &mut self.auto_populate_has_one,
            "all_array_uses_keys" => &mut self.all_array_uses_keys,
            _ => &mut self.cascade_delete,
        }
    }

    /// Cache expiration as a duration, `None` when entries never expire
    pub fn cache_max_age(&self) -> Option<std::time::Duration> {
        match self.cache_expiration {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}

fn expect_text(key: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        // empty-ish values reset the option to an empty string
        Value::Null | Value::Bool(false) => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        _ => Err(ConfigError::invalid_type(key, "a string value")),
    }
}

fn expect_unsigned(key: &str, value: &Value, expected: &str) -> Result<u64, ConfigError> {
    match value {
        Value::Null | Value::Bool(false) => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ConfigError::invalid_value(key, n.to_string(), expected)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::invalid_value(key, s.as_str(), expected)),
        _ => Err(ConfigError::invalid_type(key, expected)),
    }
}

fn expect_directory(key: &str, value: &Value) -> Result<Option<PathBuf>, ConfigError> {
    let path = match value {
        Value::Null | Value::Bool(false) => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => Path::new(s),
        _ => return Err(ConfigError::invalid_type(key, "a directory name")),
    };

    let metadata = std::fs::metadata(path).map_err(|_| {
        ConfigError::invalid_value(key, path.display().to_string(), "a valid directory name")
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::invalid_value(
            key,
            path.display().to_string(),
            "a valid directory name",
        ));
    }
    if metadata.permissions().readonly() {
        return Err(ConfigError::invalid_value(
            key,
            path.display().to_string(),
            "a writeable directory",
        ));
    }
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = DataMapperConfig::default();
        assert_eq!(config.free_result_threshold, 100);
        assert_eq!(config.field_label_lang_format, "${model}_${field}");
        assert!(config.cascade_delete);
        assert!(config.cache_max_age().is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = DataMapperConfig::default();
        config
            .apply_overrides(&overrides(json!({
                "prefix": "app_",
                "auto_populate_has_many": true,
                "free_result_threshold": "250",
                "cache_expiration": 60,
                "db_params": "reporting",
            })))
            .unwrap();

        assert_eq!(config.prefix, "app_");
        assert!(config.auto_populate_has_many);
        assert_eq!(config.free_result_threshold, 250);
        assert_eq!(config.cache_max_age(), Some(std::time::Duration::from_secs(60)));
        assert_eq!(config.db_params.as_deref(), Some("reporting"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut config = DataMapperConfig::default();
        let err = config
            .apply_overrides(&overrides(json!({ "extensions": ["array"] })))
            .unwrap_err();
        assert_eq!(err, ConfigError::unknown_key("extensions"));
    }

    #[test]
    fn test_type_checks() {
        let mut config = DataMapperConfig::default();
        assert!(config
            .apply_overrides(&overrides(json!({ "local_time": "yes" })))
            .is_err());
        assert!(config
            .apply_overrides(&overrides(json!({ "prefix": 12 })))
            .is_err());
        assert!(config
            .apply_overrides(&overrides(json!({ "cache_expiration": -5 })))
            .is_err());
        assert!(config
            .apply_overrides(&overrides(json!({ "db_params": "" })))
            .is_err());
    }

    #[test]
    fn test_cache_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DataMapperConfig::default();
        config
            .apply_overrides(&overrides(json!({ "cache_path": dir.path().to_str().unwrap() })))
            .unwrap();
        assert_eq!(config.cache_path.as_deref(), Some(dir.path()));

        let missing = dir.path().join("missing");
        let err = config
            .apply_overrides(&overrides(json!({ "cache_path": missing.to_str().unwrap() })))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_json_str() {
        let config = DataMapperConfig::from_json_str(r#"{"join_prefix": "j_"}"#).unwrap();
        assert_eq!(config.join_prefix, "j_");
        assert!(DataMapperConfig::from_json_str("[1, 2]").is_err());
    }
}
