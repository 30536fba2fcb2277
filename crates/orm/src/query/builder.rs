//! Query Builder - Core builder implementation
//!
//! The builder only accumulates clause fragments; every column it receives has
//! already been qualified by the owning model instance.

use super::types::*;

/// Clause accumulation for a single SELECT statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    pub(crate) select_fields: Vec<String>,
    pub(crate) from_tables: Vec<String>,
    pub(crate) where_clauses: Vec<WhereClause>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) order_by: Vec<(String, Option<OrderDirection>)>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having_clauses: Vec<WhereClause>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) distinct: bool,
    pub(crate) group_depth: usize,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every accumulated clause, as if the query had been run
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn select_fields(&self) -> &[String] {
        &self.select_fields
    }

    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.where_clauses
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn order_by_clauses(&self) -> &[(String, Option<OrderDirection>)] {
        &self.order_by
    }

    pub fn has_where(&self) -> bool {
        !self.where_clauses.is_empty()
    }

    pub fn has_order_by(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Current group nesting depth
    pub fn group_depth(&self) -> usize {
        self.group_depth
    }
}
