//! Core Storage Engine Traits
//!
//! The ORM never talks to a database directly. Everything it needs from the
//! storage side goes through `StorageEngine`: column metadata for schema builds,
//! execution of compiled statements, and the dialect's quoting and escaping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DatabaseBackendType;
use crate::error::OrmResult;

/// A single result row, field name to value, in the order the engine returned them
pub type ResultRow = IndexMap<String, Value>;

/// Column metadata reported by the storage engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Rows returned by an executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<ResultRow>,
    pub row_count: usize,
    freed: bool,
}

impl QueryResult {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            row_count,
            freed: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Column names of the first row
    pub fn column_names(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Release the row storage
    pub fn free(&mut self) {
        self.rows = Vec::new();
        self.freed = true;
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }
}

/// Abstract storage engine
///
/// Implementations are shared between every model instance created by an
/// `Engine`, so they must be `Send + Sync`.
pub trait StorageEngine: Send + Sync {
    /// Describe the columns of a table, in table order
    fn describe_columns(&self, table: &str) -> OrmResult<Vec<ColumnInfo>>;

    /// Execute a statement and return its rows
    fn execute(&self, sql: &str, binds: &[Value]) -> OrmResult<QueryResult>;

    /// The SQL dialect spoken by this engine
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    /// Quote an identifier, qualified names are quoted per segment
    fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.backend_type().identifier_quote();
        identifier
            .split('.')
            .map(|part| {
                let part = part.trim();
                if part == "*" || (part.starts_with(quote) && part.ends_with(quote) && part.len() > 1) {
                    part.to_string()
                } else {
                    format!("{}{}{}", quote, part, quote)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escape a value for use inside a LIKE pattern
    fn escape_like(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(c, '!' | '%' | '_') {
                escaped.push('!');
            }
            escaped.push(c);
        }
        escaped
    }

    /// Render a value as an SQL literal
    fn escape_literal(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string().to_uppercase(),
            Value::Null => "NULL".to_string(),
            other => format!("'{}'", other.to_string().replace('\'', "''")),
        }
    }

    /// Expression used to count rows when no distinct column is requested
    fn count_all_expression(&self) -> &str {
        "COUNT(*)"
    }

    /// Give a result set back to the engine once it has been mapped
    fn free_result(&self, result: &mut QueryResult) {
        result.free();
    }
}
