//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add a comparison; `column` may end with its own operator (`"price >"`)
    pub fn where_compare(
        &mut self,
        connective: Connective,
        column: &str,
        value: Option<Value>,
        escape: bool,
    ) -> &mut Self {
        self.push_where(
            connective,
            Condition::Compare {
                column: column.to_string(),
                value,
                escape,
            },
        )
    }

    /// Add an IN / NOT IN list. An empty list adds nothing.
    pub fn where_in_values(
        &mut self,
        connective: Connective,
        column: &str,
        values: Vec<Value>,
        not: bool,
    ) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        self.push_where(
            connective,
            Condition::In {
                column: column.to_string(),
                values,
                not,
            },
        )
    }

    /// Add BETWEEN / NOT BETWEEN
    pub fn where_between_values(
        &mut self,
        connective: Connective,
        column: &str,
        low: Value,
        high: Value,
        not: bool,
    ) -> &mut Self {
        self.push_where(
            connective,
            Condition::Between {
                column: column.to_string(),
                low,
                high,
                not,
            },
        )
    }

    /// Add a LIKE pattern match
    pub fn where_like(
        &mut self,
        connective: Connective,
        column: &str,
        value: &str,
        side: LikeSide,
        not: bool,
        case_insensitive: bool,
    ) -> &mut Self {
        self.push_where(
            connective,
            Condition::Like {
                column: column.to_string(),
                value: value.to_string(),
                side,
                not,
                case_insensitive,
            },
        )
    }

    /// Add raw WHERE condition for complex cases
    pub fn where_raw(&mut self, connective: Connective, raw_condition: &str) -> &mut Self {
        self.push_where(connective, Condition::Raw(raw_condition.to_string()))
    }

    /// Open a parenthesised group
    pub fn group_start(&mut self, connective: Connective, not: bool) -> &mut Self {
        self.group_depth += 1;
        self.push_where(connective, Condition::GroupOpen { not })
    }

    /// Close the innermost group. A group closed right after it was opened is
    /// removed instead of rendering `()`.
    pub fn group_end(&mut self) -> &mut Self {
        self.group_depth = self.group_depth.saturating_sub(1);
        let empty_group = self
            .where_clauses
            .last()
            .map_or(false, WhereClause::is_group_open);
        if empty_group {
            self.where_clauses.pop();
        } else {
            self.where_clauses
                .push(WhereClause::new(Connective::And, Condition::GroupClose));
        }
        self
    }

    /// Wrap all existing WHERE clauses in one group, unless they already form
    /// a single group
    pub fn wrap_where(&mut self) -> &mut Self {
        if self.where_clauses.is_empty() || self.where_is_single_group() {
            return self;
        }
        let mut wrapped = Vec::with_capacity(self.where_clauses.len() + 2);
        wrapped.push(WhereClause::new(Connective::And, Condition::GroupOpen { not: false }));
        wrapped.append(&mut self.where_clauses);
        wrapped.push(WhereClause::new(Connective::And, Condition::GroupClose));
        self.where_clauses = wrapped;
        self
    }

    fn where_is_single_group(&self) -> bool {
        match self.where_clauses.first() {
            Some(WhereClause {
                condition: Condition::GroupOpen { not: false },
                ..
            }) => {}
            _ => return false,
        }

        let mut depth = 0usize;
        let last = self.where_clauses.len() - 1;
        for (i, clause) in self.where_clauses.iter().enumerate() {
            if clause.is_group_open() {
                depth += 1;
            } else if clause.is_group_close() {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
        }
        false
    }

    /// Add HAVING comparison
    pub fn having_compare(
        &mut self,
        connective: Connective,
        column: &str,
        value: Option<Value>,
        escape: bool,
    ) -> &mut Self {
        self.having_clauses.push(WhereClause::new(
            connective,
            Condition::Compare {
                column: column.to_string(),
                value,
                escape,
            },
        ));
        self
    }

    fn push_where(&mut self, connective: Connective, condition: Condition) -> &mut Self {
        self.where_clauses.push(WhereClause::new(connective, condition));
        self
    }
}
