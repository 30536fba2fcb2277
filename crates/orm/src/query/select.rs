//! Query Builder SELECT operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add already qualified SELECT expressions
    pub fn select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields
            .extend(fields.into_iter().map(Into::into).filter(|f| !f.trim().is_empty()));
        self
    }

    /// Add a custom SELECT expression
    pub fn select_raw(&mut self, expression: &str) -> &mut Self {
        self.select_fields.push(expression.to_string());
        self
    }

    /// Put an expression in front of the SELECT list
    pub fn prepend_select(&mut self, expression: &str) -> &mut Self {
        self.select_fields.insert(0, expression.to_string());
        self
    }

    /// Add an aggregate over a qualified column
    pub fn select_aggregate(&mut self, function: &str, column: &str, alias: Option<&str>) -> &mut Self {
        let select_expr = match alias {
            Some(alias) => format!("{}({}) AS {}", function, column, alias),
            None => format!("{}({})", function, column),
        };
        self.select_fields.push(select_expr);
        self
    }

    /// Add SELECT DISTINCT to the query
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Set the FROM table, with its alias
    pub fn from(&mut self, table: &str, alias: &str) -> &mut Self {
        self.from_tables = vec![format!("{} {}", table, alias)];
        self
    }

    /// True if any non-subquery SELECT expression mentions `needle`
    pub fn selects_from(&self, needle: &str) -> bool {
        self.select_fields
            .iter()
            .filter(|select| !select.starts_with("(SELECT"))
            .any(|select| select.contains(needle))
    }

    /// Forget the SELECT list only
    pub fn clear_select(&mut self) -> &mut Self {
        self.select_fields.clear();
        self
    }
}
