//! Query Builder SQL generation

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::StorageEngine;
use crate::error::QueryError;

impl QueryBuilder {
    /// Compile the accumulated clauses into a SELECT statement
    pub fn to_sql(&self, storage: &dyn StorageEngine) -> Result<String, QueryError> {
        let select = if self.select_fields.is_empty() {
            "*".to_string()
        } else {
            self.select_fields.join(", ")
        };
        self.build_select_sql(storage, &select, true)
    }

    /// Compile a counting statement; the SELECT list and ORDER BY are replaced
    pub fn to_count_sql(&self, storage: &dyn StorageEngine, count_expression: &str) -> Result<String, QueryError> {
        self.build_select_sql(storage, count_expression, false)
    }

    fn build_select_sql(
        &self,
        storage: &dyn StorageEngine,
        select: &str,
        with_order: bool,
    ) -> Result<String, QueryError> {
        let mut sql = String::new();

        // SELECT clause
        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }
        sql.push_str(select);

        // FROM clause
        if !self.from_tables.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from_tables.join(", "));
        }

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(" {} {} {}", join.join_type, join.table, join.alias));
            if !join.on_conditions.is_empty() {
                sql.push_str(" ON ");
                let conditions: Vec<String> = join
                    .on_conditions
                    .iter()
                    .map(|(left, right)| format!("{} = {}", left, right))
                    .collect();
                sql.push_str(&conditions.join(" AND "));
            }
        }

        // WHERE clause
        let conditions = render_conditions(&self.where_clauses, storage)?;
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        // GROUP BY clause
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        // HAVING clause
        let having = render_conditions(&self.having_clauses, storage)?;
        if !having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }

        // ORDER BY clause
        if with_order && !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| match direction {
                    Some(OrderDirection::Random) => OrderDirection::Random.to_string(),
                    Some(direction) => format!("{} {}", column, direction),
                    None => column.clone(),
                })
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        if with_order {
            // LIMIT clause
            if let Some(limit) = self.limit_count {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            // OFFSET clause
            if let Some(offset) = self.offset_value {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        Ok(sql)
    }
}

/// Render a clause list. The connective of a clause is dropped when it is the
/// first one, or the first one inside a group.
pub(crate) fn render_conditions(
    clauses: &[WhereClause],
    storage: &dyn StorageEngine,
) -> Result<String, QueryError> {
    let mut sql = String::new();
    let mut depth = 0usize;
    let mut group_opened = true;

    for clause in clauses {
        match &clause.condition {
            Condition::GroupOpen { not } => {
                if !group_opened {
                    sql.push_str(&format!(" {} ", clause.connective));
                }
                if *not {
                    sql.push_str("NOT ");
                }
                sql.push('(');
                depth += 1;
                group_opened = true;
            }
            Condition::GroupClose => {
                if depth == 0 {
                    return Err(QueryError::UnbalancedGroup(
                        "group_end() called without a matching group_start()".to_string(),
                    ));
                }
                depth -= 1;
                sql.push(')');
                group_opened = false;
            }
            condition => {
                if !group_opened {
                    sql.push_str(&format!(" {} ", clause.connective));
                }
                sql.push_str(&render_condition(condition, storage));
                group_opened = false;
            }
        }
    }

    if depth != 0 {
        return Err(QueryError::UnbalancedGroup(format!(
            "{} group(s) left open",
            depth
        )));
    }

    Ok(sql)
}

fn render_condition(condition: &Condition, storage: &dyn StorageEngine) -> String {
    match condition {
        Condition::Compare {
            column,
            value,
            escape,
        } => {
            let column = column.trim();
            match value {
                None | Some(Value::Null) if has_operator(column) => format!("{} NULL", column),
                None | Some(Value::Null) => format!("{} IS NULL", column),
                Some(value) => {
                    let value = render_value(value, *escape, storage);
                    if has_operator(column) {
                        format!("{} {}", column, value)
                    } else {
                        format!("{} = {}", column, value)
                    }
                }
            }
        }
        Condition::In { column, values, not } => {
            let values: Vec<String> = values.iter().map(|v| storage.escape_literal(v)).collect();
            format!(
                "{} {}IN ({})",
                column,
                if *not { "NOT " } else { "" },
                values.join(", ")
            )
        }
        Condition::Between {
            column,
            low,
            high,
            not,
        } => format!(
            "{} {}BETWEEN {} AND {}",
            column,
            if *not { "NOT " } else { "" },
            storage.escape_literal(low),
            storage.escape_literal(high)
        ),
        Condition::Like {
            column,
            value,
            side,
            not,
            case_insensitive,
        } => {
            let (column, value) = if *case_insensitive {
                (format!("UPPER({})", column), value.to_uppercase())
            } else {
                (column.clone(), value.clone())
            };
            let pattern = side.wrap(&storage.escape_like(&value));
            format!(
                "{} {}LIKE {} ESCAPE '!'",
                column,
                if *not { "NOT " } else { "" },
                storage.escape_literal(&Value::String(pattern))
            )
        }
        Condition::Raw(raw) => raw.clone(),
        // groups are handled by render_conditions
        Condition::GroupOpen { .. } | Condition::GroupClose => String::new(),
    }
}

fn render_value(value: &Value, escape: bool, storage: &dyn StorageEngine) -> String {
    if escape {
        return storage.escape_literal(value);
    }
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True if the column expression already ends in a comparison operator
pub(crate) fn has_operator(column: &str) -> bool {
    let column = column.trim();
    column.contains(char::is_whitespace) || column.ends_with(['=', '<', '>'])
}
