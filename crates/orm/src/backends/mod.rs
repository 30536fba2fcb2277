//! Storage Backend Abstractions
//!
//! The ORM core is handed an implementation of `StorageEngine` and never
//! opens connections itself. The backend type only decides the dialect
//! details (identifier quoting).

pub mod core;

// Re-export core traits and types
pub use self::core::*;

/// Database backend type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Character used to quote identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            DatabaseBackendType::MySQL => '`',
            DatabaseBackendType::PostgreSQL | DatabaseBackendType::SQLite => '"',
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "mysql" => Ok(DatabaseBackendType::MySQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}
