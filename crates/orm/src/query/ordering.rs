//! Query Builder ORDER BY, GROUP BY, LIMIT operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add ORDER BY clause, no direction means the database default
    pub fn order_by(&mut self, column: &str, direction: Option<OrderDirection>) -> &mut Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit_count = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset_value = Some(offset);
        self
    }

    /// Apply an optional limit and offset, as passed to the terminal fetches
    pub fn limit_offset(&mut self, limit: Option<u64>, offset: Option<u64>) -> &mut Self {
        if let Some(limit) = limit {
            self.limit_count = Some(limit);
            if let Some(offset) = offset {
                self.offset_value = Some(offset);
            }
        }
        self
    }
}
