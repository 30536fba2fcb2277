//! Chainable query methods on model instances
//!
//! Every field name goes through `add_table_name`, so bare fields of this
//! model are qualified with its alias before reaching the query builder.

use serde_json::{Map, Value};

use super::instance::ModelInstance;
use crate::query::{add_table_name, Connective, FuncArg, LikeSide, OrderDirection};

impl ModelInstance {
    /// Qualify bare field names of this model
    pub fn qualify(&self, expression: &str) -> String {
        add_table_name(&self.alias, &self.schema.fields, expression)
    }

    fn compare(&mut self, connective: Connective, field: &str, value: Option<Value>, escape: bool) -> &mut Self {
        let column = self.qualify(field);
        self.query.where_compare(connective, &column, value, escape);
        self
    }

    /// `WHERE field = value`; the field may end with its own operator
    /// (`"price >"`)
    pub fn where_eq(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(Connective::And, field, Some(value.into()), true)
    }

    pub fn or_where_eq(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(Connective::Or, field, Some(value.into()), true)
    }

    /// Compare against an SQL expression that is not escaped
    pub fn where_unescaped(&mut self, field: &str, expression: &str) -> &mut Self {
        self.compare(Connective::And, field, Some(Value::String(expression.to_string())), false)
    }

    /// One equality per entry, all joined with AND
    pub fn where_map(&mut self, conditions: &Map<String, Value>) -> &mut Self {
        for (field, value) in conditions {
            self.compare(Connective::And, field, Some(value.clone()), true);
        }
        self
    }

    pub fn or_where_map(&mut self, conditions: &Map<String, Value>) -> &mut Self {
        for (field, value) in conditions {
            self.compare(Connective::Or, field, Some(value.clone()), true);
        }
        self
    }

    pub fn where_null(&mut self, field: &str) -> &mut Self {
        self.compare(Connective::And, field, None, true)
    }

    pub fn where_not_null(&mut self, field: &str) -> &mut Self {
        let field = format!("{} IS NOT", field.trim());
        self.compare(Connective::And, &field, None, true)
    }

    /// A free-form condition; bare field names in it are still qualified
    pub fn where_raw(&mut self, condition: &str) -> &mut Self {
        let condition = self.qualify(condition);
        self.query.where_raw(Connective::And, &condition);
        self
    }

    pub fn or_where_raw(&mut self, condition: &str) -> &mut Self {
        let condition = self.qualify(condition);
        self.query.where_raw(Connective::Or, &condition);
        self
    }

    fn where_in_with(&mut self, connective: Connective, field: &str, values: Vec<Value>, not: bool) -> &mut Self {
        let column = self.qualify(field);
        self.query.where_in_values(connective, &column, values, not);
        self
    }

    pub fn where_in(&mut self, field: &str, values: Vec<Value>) -> &mut Self {
        self.where_in_with(Connective::And, field, values, false)
    }

    pub fn or_where_in(&mut self, field: &str, values: Vec<Value>) -> &mut Self {
        self.where_in_with(Connective::Or, field, values, false)
    }

    pub fn where_not_in(&mut self, field: &str, values: Vec<Value>) -> &mut Self {
        self.where_in_with(Connective::And, field, values, true)
    }

    pub fn or_where_not_in(&mut self, field: &str, values: Vec<Value>) -> &mut Self {
        self.where_in_with(Connective::Or, field, values, true)
    }

    fn between_with(
        &mut self,
        connective: Connective,
        field: &str,
        low: Value,
        high: Value,
        not: bool,
    ) -> &mut Self {
        let column = self.qualify(field);
        self.query
            .where_between_values(connective, &column, low, high, not);
        self
    }

    pub fn where_between(&mut self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        self.between_with(Connective::And, field, low.into(), high.into(), false)
    }

    pub fn or_where_between(&mut self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        self.between_with(Connective::Or, field, low.into(), high.into(), false)
    }

    pub fn where_not_between(&mut self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        self.between_with(Connective::And, field, low.into(), high.into(), true)
    }

    pub fn or_where_not_between(&mut self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        self.between_with(Connective::Or, field, low.into(), high.into(), true)
    }

    fn like_with(
        &mut self,
        connective: Connective,
        field: &str,
        value: &str,
        side: LikeSide,
        not: bool,
        case_insensitive: bool,
    ) -> &mut Self {
        let column = self.qualify(field);
        self.query
            .where_like(connective, &column, value, side, not, case_insensitive);
        self
    }

    pub fn like(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::And, field, value, side, false, false)
    }

    pub fn or_like(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::Or, field, value, side, false, false)
    }

    pub fn not_like(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::And, field, value, side, true, false)
    }

    pub fn or_not_like(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::Or, field, value, side, true, false)
    }

    /// Case-insensitive LIKE, both sides are upper-cased
    pub fn ilike(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::And, field, value, side, false, true)
    }

    pub fn or_ilike(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::Or, field, value, side, false, true)
    }

    pub fn not_ilike(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::And, field, value, side, true, true)
    }

    pub fn or_not_ilike(&mut self, field: &str, value: &str, side: LikeSide) -> &mut Self {
        self.like_with(Connective::Or, field, value, side, true, true)
    }

    pub fn group_start(&mut self) -> &mut Self {
        self.query.group_start(Connective::And, false);
        self
    }

    pub fn or_group_start(&mut self) -> &mut Self {
        self.query.group_start(Connective::Or, false);
        self
    }

    pub fn not_group_start(&mut self) -> &mut Self {
        self.query.group_start(Connective::And, true);
        self
    }

    pub fn or_not_group_start(&mut self) -> &mut Self {
        self.query.group_start(Connective::Or, true);
        self
    }

    /// Close the innermost group; an empty group disappears
    pub fn group_end(&mut self) -> &mut Self {
        self.query.group_end();
        self
    }

    /// Select fields (or expressions) of this model
    pub fn select(&mut self, fields: &[&str]) -> &mut Self {
        let fields: Vec<String> = fields.iter().map(|f| self.qualify(f)).collect();
        self.query.select(fields);
        self
    }

    fn select_aggregate(&mut self, function: &str, field: &str, alias: Option<&str>) -> &mut Self {
        let column = self.qualify(field);
        let alias = alias.map(|a| self.engine.quote(a));
        self.query.select_aggregate(function, &column, alias.as_deref());
        self
    }

    pub fn select_max(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate("MAX", field, alias)
    }

    pub fn select_min(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate("MIN", field, alias)
    }

    pub fn select_avg(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate("AVG", field, alias)
    }

    pub fn select_sum(&mut self, field: &str, alias: Option<&str>) -> &mut Self {
        self.select_aggregate("SUM", field, alias)
    }

    /// Select `FUNCTION(args...) AS alias`
    pub fn select_func(&mut self, function: &str, args: &[FuncArg], alias: &str) -> &mut Self {
        let expression = self.func_expression(function, args);
        let select = format!("{} AS {}", expression, self.engine.quote(alias));
        self.query.select_raw(&select);
        self
    }

    pub(crate) fn func_expression(&self, function: &str, args: &[FuncArg]) -> String {
        let args: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                FuncArg::Field(field) => format!("{}.{}", self.alias, field),
                FuncArg::Literal(value) => self.engine.storage().escape_literal(value),
                FuncArg::Raw(raw) => raw.clone(),
            })
            .collect();
        format!("{}({})", function.to_uppercase(), args.join(", "))
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.query.distinct(distinct);
        self
    }

    pub fn group_by(&mut self, field: &str) -> &mut Self {
        let column = self.qualify(field);
        self.query.group_by(&column);
        self
    }

    pub fn having(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let column = self.qualify(field);
        self.query
            .having_compare(Connective::And, &column, Some(value.into()), true);
        self
    }

    pub fn or_having(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let column = self.qualify(field);
        self.query
            .having_compare(Connective::Or, &column, Some(value.into()), true);
        self
    }

    pub fn order_by(&mut self, field: &str, direction: Option<OrderDirection>) -> &mut Self {
        let column = self.qualify(field);
        self.query.order_by(&column, direction);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.query.limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.query.offset(offset);
        self
    }
}
