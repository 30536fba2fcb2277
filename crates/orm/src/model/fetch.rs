//! Terminal operations: compile, execute and map

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::instance::{Instantiation, ModelInstance};
use crate::backends::{QueryResult, ResultRow};
use crate::error::{ModelResult, RelationshipError};
use crate::query::{add_table_name, Connective, QueryBuilder};
use crate::relationships::{find_inverse, resolve_path, RelationStep, RelationshipType};

impl ModelInstance {
    /// Fetch every matching row: the first one into `self`, the rest into the
    /// result collection
    pub fn get(&mut self) -> ModelResult<&mut Self> {
        self.get_limited(None, None)
    }

    pub fn get_limited(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<&mut Self> {
        // a validated, unrelated object fetches by its own field values
        if self.flags.validated && self.parent.is_none() {
            let filters: Vec<(String, Value)> = self
                .current
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
            if !filters.is_empty() {
                self.query.reset();
                self.clear();
                for (field, value) in filters {
                    self.where_eq(&field, value);
                }
                return self.run_select(limit, offset);
            }
        }

        self.prepare_related()?;
        self.run_select(limit, offset)
    }

    /// `where_map` followed by `get_limited`
    pub fn get_where(
        &mut self,
        conditions: &Map<String, Value>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> ModelResult<&mut Self> {
        self.where_map(conditions);
        self.get_limited(limit, offset)
    }

    /// Fetch by a single field value
    pub fn get_by(&mut self, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        self.where_eq(field, value);
        self.get()
    }

    /// Fetch by a field of a related model
    pub fn get_by_related(&mut self, path: &str, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        self.where_related(path, field, value)?;
        self.get()
    }

    /// Compile the pending SELECT without running it. The pending clauses are
    /// consumed.
    pub fn get_sql(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<String> {
        self.prepare_related()?;
        self.compile_select(limit, offset)
    }

    /// Compile the pending query for use inside another query: no implicit
    /// `alias.*` select and no parent filter
    pub fn subquery_sql(&mut self) -> ModelResult<String> {
        let mut query = std::mem::take(&mut self.query);
        query.from(&self.schema.table_name, &self.alias);
        self.apply_default_order(&mut query);
        Ok(query.to_sql(self.engine.storage())?)
    }

    /// Run the pending query and return the rows without mapping them
    pub fn get_raw(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<QueryResult> {
        self.prepare_related()?;
        let mut query = std::mem::take(&mut self.query);
        query.from(&self.schema.table_name, &self.alias);
        self.apply_default_order(&mut query);
        query.limit_offset(limit, offset);
        let sql = query.to_sql(self.engine.storage())?;
        self.execute(&sql, &[])
    }

    /// Run a raw statement and map its rows onto this model
    pub fn query(&mut self, sql: &str, binds: &[Value]) -> ModelResult<&mut Self> {
        self.query.reset();
        self.clear();
        let result = self.execute(sql, binds)?;
        self.process_query(result)?;
        Ok(self)
    }

    /// Like `get_limited`, but rows are mapped one at a time as the iterator
    /// is consumed. `self` is left untouched apart from its pending query.
    pub fn get_iterated(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<ResultIter> {
        self.prepare_related()?;
        let sql = self.compile_select(limit, offset)?;
        let instantiations = std::mem::take(&mut self.instantiations);
        let result = self.execute(&sql, &[])?;
        let template = self.sibling();
        Ok(ResultIter {
            template,
            instantiations,
            rows: result.rows.into_iter(),
        })
    }

    /// Count matching rows.
    ///
    /// `exclude` lists primary key tuples to leave out. A single column is
    /// counted with `COUNT(DISTINCT column)`; otherwise the engine's row count
    /// expression is used. The pending clauses are consumed either way.
    pub fn count(&mut self, exclude: &[Vec<Value>], columns: &[&str]) -> ModelResult<u64> {
        let query = std::mem::take(&mut self.query);
        let sql = self.compile_count(query, exclude, columns)?;
        let result = self.execute(&sql, &[])?;
        Ok(numrows(&result))
    }

    /// Count distinct values of `column`, the primary key by default
    pub fn count_distinct(&mut self, exclude: &[Vec<Value>], column: Option<&str>) -> ModelResult<u64> {
        match column {
            Some(column) => self.count(exclude, &[column]),
            None => {
                let keys = self.schema.key_names();
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                self.count(exclude, &keys)
            }
        }
    }

    /// True if `other` is related to this object
    pub fn is_related_to(&mut self, other: &ModelInstance) -> ModelResult<bool> {
        if !self.exists() || !other.exists() {
            return Ok(false);
        }
        let relation = crate::relationships::find(&self.schema, other.model_name())
            .map(|rel| rel.name.clone())
            .ok_or_else(|| RelationshipError::NotFound {
                model: self.schema.model_name.clone(),
                relation: other.model_name().to_string(),
            })?;
        let keys: Vec<(String, Value)> = other
            .schema
            .primary_keys
            .keys()
            .map(|k| (k.clone(), other.current.get(k).cloned().unwrap_or(Value::Null)))
            .collect();
        self.count_related_by_keys(&relation, keys)
    }

    /// True if the related object of `relation` with these key values (in
    /// declaration order) is related to this object
    pub fn is_related_to_keys(&mut self, relation: &str, keys: &[Value]) -> ModelResult<bool> {
        if !self.exists() {
            return Ok(false);
        }
        let child = self.related_child(relation, false)?;
        let keys: Vec<(String, Value)> = child
            .schema
            .primary_keys
            .keys()
            .cloned()
            .zip(keys.iter().cloned())
            .collect();
        self.count_related_by_keys(relation, keys)
    }

    fn count_related_by_keys(&mut self, relation: &str, keys: Vec<(String, Value)>) -> ModelResult<bool> {
        let child = self.related_child(relation, false)?;
        for (key, value) in keys {
            child.where_eq(&key, value);
        }
        Ok(child.count(&[], &[])? > 0)
    }

    /// Clone the pending query, add the parent filters and swap it in. The
    /// instance is left unchanged when a relation cannot be resolved.
    pub(crate) fn prepare_related(&mut self) -> ModelResult<()> {
        if self.parent.is_none() {
            return Ok(());
        }
        let mut query = self.query.clone();
        self.apply_related(&mut query)?;
        self.query = query;
        Ok(())
    }

    /// Filter `query` by every existing ancestor. A direct parent holding the
    /// key of a `belongs_to` child is compared against the child's own
    /// foreign key columns; everything else is joined.
    pub(crate) fn apply_related(&self, query: &mut QueryBuilder) -> ModelResult<()> {
        let mut level = self.parent.as_ref();
        let mut lower = Arc::clone(&self.schema);
        let mut steps: Vec<String> = Vec::new();
        let mut wrapped = false;
        let mut include_join_fields = false;

        while let Some(link) = level {
            let down = link
                .schema
                .relations
                .by_name(&link.relation)
                .ok_or_else(|| RelationshipError::NotFound {
                    model: link.schema.model_name.clone(),
                    relation: link.relation.clone(),
                })?;
            let up = find_inverse(&lower, down).ok_or_else(|| RelationshipError::NotFound {
                model: lower.model_name.clone(),
                relation: link.schema.model_name.clone(),
            })?;
            steps.push(up.name.clone());

            if link.exists {
                if !wrapped {
                    query.wrap_where();
                    wrapped = true;
                }

                let local_key = steps.len() == 1
                    && link.parent.is_none()
                    && up.relationship_type == RelationshipType::BelongsTo
                    && down.relationship_type != RelationshipType::BelongsTo;

                if local_key {
                    for (column, key) in down.related_key.iter().zip(&down.my_key) {
                        query.where_compare(
                            Connective::And,
                            &format!("{}.{}", self.alias, column),
                            Some(link.value(key)),
                            true,
                        );
                    }
                } else {
                    let path: Vec<RelationStep<'_>> = steps.iter().map(|s| RelationStep::Name(s)).collect();
                    let target = resolve_path(
                        &self.engine,
                        query,
                        &self.schema,
                        &self.alias,
                        &path,
                        false,
                        &mut include_join_fields,
                    )?;
                    for key in &down.my_key {
                        query.where_compare(
                            Connective::And,
                            &format!("{}.{}", target.alias, key),
                            Some(link.value(key)),
                            true,
                        );
                    }
                }
            }

            lower = Arc::clone(&link.schema);
            level = link.parent.as_deref();
        }
        Ok(())
    }

    fn run_select(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<&mut Self> {
        let sql = self.compile_select(limit, offset)?;
        self.clear();
        let result = self.execute(&sql, &[])?;
        self.process_query(result)?;
        Ok(self)
    }

    /// Take the pending query and compile it as a full fetch
    fn compile_select(&mut self, limit: Option<u64>, offset: Option<u64>) -> ModelResult<String> {
        let mut query = std::mem::take(&mut self.query);
        if !query.selects_from(&format!("{}.", self.alias)) {
            query.prepend_select(&format!("{}.*", self.alias));
        }
        query.from(&self.schema.table_name, &self.alias);
        self.apply_default_order(&mut query);
        query.limit_offset(limit, offset);
        Ok(query.to_sql(self.engine.storage())?)
    }

    fn compile_count(&self, mut query: QueryBuilder, exclude: &[Vec<Value>], columns: &[&str]) -> ModelResult<String> {
        self.apply_related(&mut query)?;
        query.from(&self.schema.table_name, &self.alias);

        let keys: Vec<String> = self
            .schema
            .primary_keys
            .keys()
            .map(|k| format!("{}.{}", self.alias, k))
            .collect();
        if !exclude.is_empty() {
            if let [key] = keys.as_slice() {
                let values: Vec<Value> = exclude.iter().filter_map(|t| t.first().cloned()).collect();
                query.where_in_values(Connective::And, key, values, true);
            } else {
                let tuples: Vec<&Vec<Value>> = exclude.iter().filter(|t| t.len() == keys.len()).collect();
                if !tuples.is_empty() {
                    query.group_start(Connective::And, true);
                    for tuple in tuples {
                        query.group_start(Connective::Or, false);
                        for (key, value) in keys.iter().zip(tuple) {
                            query.where_compare(Connective::And, key, Some(value.clone()), true);
                        }
                        query.group_end();
                    }
                    query.group_end();
                }
            }
        }

        let storage = self.engine.storage();
        let expression = match columns {
            [column] => format!("COUNT(DISTINCT {})", self.qualify(column)),
            _ => storage.count_all_expression().to_string(),
        };
        let select = format!("{} AS {}", expression, self.engine.quote("numrows"));
        Ok(query.to_count_sql(storage, &select)?)
    }

    /// Default order of the schema, only when nothing else orders the query
    /// and the select list is this model's plain columns
    pub(crate) fn apply_default_order(&self, query: &mut QueryBuilder) {
        if self.schema.default_order_by.is_empty() || query.has_order_by() {
            return;
        }
        let own_columns = format!("{}.*", self.alias);
        let plain = match query.select_fields() {
            [] => true,
            [only] => only == "*" || *only == own_columns,
            _ => false,
        };
        if !plain {
            return;
        }
        for (field, direction) in &self.schema.default_order_by {
            let column = add_table_name(&self.alias, &self.schema.fields, field);
            query.order_by(&column, *direction);
        }
    }

    pub(crate) fn execute(&self, sql: &str, binds: &[Value]) -> ModelResult<QueryResult> {
        tracing::debug!(model = %self.schema.model_name, sql, "executing query");
        self.engine.storage().execute(sql, binds)
    }
}

fn numrows(result: &QueryResult) -> u64 {
    match result.rows.first().and_then(|row| row.get("numrows")) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Lazily mapped rows of [`ModelInstance::get_iterated`]
#[derive(Debug)]
pub struct ResultIter {
    template: ModelInstance,
    instantiations: IndexMap<String, Vec<Instantiation>>,
    rows: std::vec::IntoIter<ResultRow>,
}

impl Iterator for ResultIter {
    type Item = ModelResult<ModelInstance>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let mut item = self.template.clone();
        Some(item.to_object(row, &self.instantiations).map(|_| item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultIter {}
