//! Error types for the ORM system
//!
//! Every failure surfaces synchronously as a `ModelError`. Configuration,
//! relationship and query-compilation problems have dedicated sub-enums that
//! convert into the matching `ModelError` variant.

use std::fmt;

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Invalid schema or configuration, raised while building a model
    Configuration(String),
    /// Unresolvable or incompatible relation
    Relationship(String),
    /// Malformed clause combination detected while compiling SQL
    Query(String),
    /// Opaque failure reported by the storage engine
    Storage(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Schema cache read or write failure
    Cache(String),
    /// Model not registered with the engine
    NotFound(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Cache(msg) => write!(f, "Cache error: {}", msg),
            ModelError::NotFound(model) => write!(f, "Model '{}' is not registered", model),
        }
    }
}

impl std::error::Error for ModelError {}

impl ModelError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ModelError::Configuration(_))
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, ModelError::Relationship(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self, ModelError::Query(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, ModelError::Storage(_))
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Cache(err.to_string())
    }
}

// Storage collaborators commonly report failures through anyhow
impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Storage(err.to_string())
    }
}

/// Configuration error raised while validating global options or model descriptors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Unknown configuration key '{key}'")]
    UnknownKey { key: String },

    #[error("Invalid type for '{key}': expected {expected}")]
    InvalidType { key: String, expected: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Key field '{key}' of model '{model}' is not a column of table '{table}'")]
    MissingKeyField {
        model: String,
        table: String,
        key: String,
    },

    #[error("Invalid relation '{relation}' on model '{model}': {reason}")]
    InvalidRelation {
        model: String,
        relation: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn unknown_key(key: impl Into<String>) -> Self {
        Self::UnknownKey { key: key.into() }
    }

    pub fn invalid_type(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidType {
            key: key.into(),
            expected: expected.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub fn invalid_relation(
        model: impl Into<String>,
        relation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            model: model.into(),
            relation: relation.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Error types for query builder operations
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A WHERE group was opened but never closed, or closed without being opened
    UnbalancedGroup(String),
    /// Invalid subquery usage
    InvalidSubquery(String),
    /// Invalid parameter for a clause
    InvalidParameter(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::UnbalancedGroup(msg) => write!(f, "Unbalanced query group: {}", msg),
            QueryError::InvalidSubquery(msg) => write!(f, "Invalid subquery: {}", msg),
            QueryError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for ModelError {
    fn from(err: QueryError) -> Self {
        ModelError::Query(err.to_string())
    }
}

/// Error types for relationship operations
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipError {
    /// No relation by that name (or towards that model)
    NotFound { model: String, relation: String },
    /// The two sides of a relation cannot be joined
    Incompatible(String),
    /// Both sides of a many-to-many relation must agree on the join table
    JoinTableMismatch { left: String, right: String },
}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipError::NotFound { model, relation } => {
                write!(f, "Unable to relate '{}' with '{}'", model, relation)
            }
            RelationshipError::Incompatible(msg) => write!(f, "Incompatible relation detected between {}", msg),
            RelationshipError::JoinTableMismatch { left, right } => write!(
                f,
                "'{}' and '{}' must define the same join table",
                left, right
            ),
        }
    }
}

impl std::error::Error for RelationshipError {}

impl From<RelationshipError> for ModelError {
    fn from(err: RelationshipError) -> Self {
        ModelError::Relationship(err.to_string())
    }
}
