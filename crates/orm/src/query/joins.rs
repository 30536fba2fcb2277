//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add LEFT OUTER JOIN to the query. An alias already in the FROM clause
    /// or joined before is not joined again.
    pub fn left_join(&mut self, table: &str, alias: &str, on_conditions: Vec<(String, String)>) -> &mut Self {
        self.join_as(JoinType::Left, table, alias, on_conditions)
    }

    pub fn join_as(
        &mut self,
        join_type: JoinType,
        table: &str,
        alias: &str,
        on_conditions: Vec<(String, String)>,
    ) -> &mut Self {
        if self.has_join(alias) {
            tracing::debug!(table, alias, "join already present");
            return self;
        }
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            alias: alias.to_string(),
            on_conditions,
        });
        self
    }

    /// True if the FROM table or a join already uses `alias`
    pub fn has_join(&self, alias: &str) -> bool {
        self.from_tables
            .iter()
            .any(|from| from.rsplit(' ').next() == Some(alias))
            || self.joins.iter().any(|join| join.alias == alias)
    }
}
