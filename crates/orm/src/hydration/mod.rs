//! Result Hydration
//!
//! Maps executed result rows onto model instances. The first row fills the
//! instance that ran the query, later rows become new instances of the same
//! model, and every instance also lands in the result collection.

use indexmap::IndexMap;
use serde_json::Value;

use crate::backends::{QueryResult, ResultRow};
use crate::error::ModelResult;
use crate::model::{Instantiation, ModelInstance, ResultKey};
use crate::validation::builtin_get_rule;

impl ModelInstance {
    /// Populate this instance and its result collection from `result`
    pub(crate) fn process_query(&mut self, mut result: QueryResult) -> ModelResult<()> {
        let instantiations = std::mem::take(&mut self.instantiations);

        if result.rows.is_empty() {
            self.clear();
            return Ok(());
        }

        self.all.clear();
        let keyed = self.schema.config.all_array_uses_keys && self.schema.primary_keys.len() == 1;
        let mut all: IndexMap<ResultKey, ModelInstance> = IndexMap::with_capacity(result.rows.len());

        for (position, row) in std::mem::take(&mut result.rows).into_iter().enumerate() {
            let item = if position == 0 {
                self.to_object(row, &instantiations)?;
                let mut snapshot = self.clone();
                snapshot.all.clear();
                snapshot
            } else {
                let mut item = self.sibling();
                item.parent = self.parent.clone();
                item.to_object(row, &instantiations)?;
                item
            };
            all.insert(item.result_key(position, keyed), item);
        }
        self.all = all;

        if result.row_count > self.schema.config.free_result_threshold {
            tracing::debug!(
                model = %self.schema.model_name,
                rows = result.row_count,
                "releasing large result set"
            );
            self.engine.storage().free_result(&mut result);
        }
        Ok(())
    }

    /// Copy one row into this instance
    pub(crate) fn to_object(
        &mut self,
        mut row: ResultRow,
        instantiations: &IndexMap<String, Vec<Instantiation>>,
    ) -> ModelResult<()> {
        // pull the flattened related columns out first
        let mut nested: Vec<(&str, Vec<(String, Value)>)> = Vec::with_capacity(instantiations.len());
        for (path, requested) in instantiations {
            let values = requested
                .iter()
                .map(|i| (i.field.clone(), row.shift_remove(&i.column).unwrap_or(Value::Null)))
                .collect();
            nested.push((path.as_str(), values));
        }

        self.load_values(row);

        for (path, values) in nested {
            let mut target: &mut ModelInstance = &mut *self;
            for name in path.split('*') {
                target = target.related_child(name, false)?;
            }
            target.load_values(values);
            target.apply_matches();
        }

        self.apply_matches();
        Ok(())
    }

    /// Store `values`, null every missing schema field, run get rules and
    /// resync the original snapshot
    fn load_values(&mut self, values: impl IntoIterator<Item = (String, Value)>) {
        for (column, value) in values {
            self.current.insert(column, value);
        }
        for field in &self.schema.fields {
            if !self.current.contains_key(field) {
                self.current.insert(field.clone(), Value::Null);
            }
        }
        self.run_get_rules();
        self.sync_original();
    }

    fn run_get_rules(&mut self) {
        let schema = std::sync::Arc::clone(&self.schema);
        let handler = self.engine.get_rule_handler();

        for (field, validation) in &schema.validation {
            if validation.get_rules.is_empty() {
                continue;
            }
            let Some(value) = self.current.get_mut(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            for rule in &validation.get_rules {
                let transformed = builtin_get_rule(rule, &*value)
                    .or_else(|| handler.and_then(|h| h.apply(rule, field, &*value)));
                match transformed {
                    Some(new_value) => *value = new_value,
                    None => tracing::debug!(model = %schema.model_name, %field, %rule, "unknown get rule"),
                }
            }
        }
    }

    /// Copy each matched field's value onto the field declaring `matches`
    fn apply_matches(&mut self) {
        let pairs: Vec<(String, String)> = self
            .schema
            .matches()
            .map(|(field, other)| (field.to_string(), other.to_string()))
            .collect();
        for (field, other) in pairs {
            let current = self.current.get(&other).cloned().unwrap_or(Value::Null);
            let original = self.original.get(&other).cloned().unwrap_or(Value::Null);
            self.current.insert(field.clone(), current);
            self.original.insert(field, original);
        }
    }
}
