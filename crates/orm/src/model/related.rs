//! Related-model queries, eager instantiation and subqueries

use indexmap::map::Entry;
use serde_json::Value;

use super::instance::{Instantiation, ModelInstance};
use crate::alias::PARENT_PLACEHOLDER;
use crate::error::{ModelResult, QueryError, RelationshipError};
use crate::query::{add_table_name, Connective, LikeSide, OrderDirection};
use crate::relationships::{add_join, find, find_inverse, resolve_path, JoinTarget, RelationDef, RelationPath, RelationStep, RelationshipType};

impl ModelInstance {
    /// The related object behind `name`, created on first access with this
    /// instance as its parent. Auto-population runs `get()` on a freshly
    /// created object when enabled for the relation and this instance exists.
    pub fn related(&mut self, name: &str) -> ModelResult<&mut ModelInstance> {
        self.related_child(name, true)
    }

    pub(crate) fn related_child(&mut self, name: &str, populate: bool) -> ModelResult<&mut ModelInstance> {
        let relation = self
            .relation_name(name)
            .and_then(|n| self.schema.relations.by_name(&n).cloned())
            .ok_or_else(|| RelationshipError::NotFound {
                model: self.schema.model_name.clone(),
                relation: name.to_string(),
            })?;

        let link = self.link_for(&relation.name);
        let populate = populate && link.exists && self.auto_populate_enabled(&relation);

        let (child, created) = match self.related.entry(relation.name.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(self.engine.model(&relation.related_class)?), true),
        };
        child.parent = Some(link);

        if created && populate {
            tracing::debug!(relation = %relation.name, "auto-populating related object");
            child.get()?;
        }
        Ok(child)
    }

    fn auto_populate_enabled(&self, relation: &RelationDef) -> bool {
        if let Some(enabled) = relation.auto_populate {
            return enabled;
        }
        match relation.relationship_type {
            RelationshipType::HasMany => self
                .flags
                .auto_populate_has_many
                .unwrap_or(self.schema.config.auto_populate_has_many),
            RelationshipType::HasOne | RelationshipType::BelongsTo => self
                .flags
                .auto_populate_has_one
                .unwrap_or(self.schema.config.auto_populate_has_one),
        }
    }

    /// Join the steps into the pending query; nothing is changed on error
    pub(crate) fn join_steps(&mut self, steps: &[RelationStep<'_>], join_only: bool) -> ModelResult<JoinTarget> {
        let mut query = self.query.clone();
        let mut include_join_fields = self.flags.include_join_fields;
        let target = resolve_path(
            &self.engine,
            &mut query,
            &self.schema,
            &self.alias,
            steps,
            join_only,
            &mut include_join_fields,
        )?;
        self.query = query;
        self.flags.include_join_fields = include_join_fields;
        Ok(target)
    }

    pub(crate) fn join_path(&mut self, path: &str, join_only: bool) -> ModelResult<JoinTarget> {
        let path = RelationPath::parse(path);
        self.join_steps(&path.steps(), join_only)
    }

    fn related_column(target: &JoinTarget, field: &str) -> String {
        add_table_name(&target.alias, &target.schema.fields, field)
    }

    fn where_related_with(
        &mut self,
        connective: Connective,
        path: &str,
        field: &str,
        value: Option<Value>,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query.where_compare(connective, &column, value, true);
        Ok(self)
    }

    /// `WHERE <related>.field = value` across a relation path
    pub fn where_related(&mut self, path: &str, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        self.where_related_with(Connective::And, path, field, Some(value.into()))
    }

    pub fn or_where_related(&mut self, path: &str, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        self.where_related_with(Connective::Or, path, field, Some(value.into()))
    }

    /// Join a relation path without filtering on it
    pub fn join_related_path(&mut self, path: &str) -> ModelResult<&mut Self> {
        self.join_path(path, false)?;
        Ok(self)
    }

    fn where_in_related_with(
        &mut self,
        connective: Connective,
        path: &str,
        field: &str,
        values: Vec<Value>,
        not: bool,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query.where_in_values(connective, &column, values, not);
        Ok(self)
    }

    pub fn where_in_related(&mut self, path: &str, field: &str, values: Vec<Value>) -> ModelResult<&mut Self> {
        self.where_in_related_with(Connective::And, path, field, values, false)
    }

    pub fn or_where_in_related(&mut self, path: &str, field: &str, values: Vec<Value>) -> ModelResult<&mut Self> {
        self.where_in_related_with(Connective::Or, path, field, values, false)
    }

    pub fn where_not_in_related(&mut self, path: &str, field: &str, values: Vec<Value>) -> ModelResult<&mut Self> {
        self.where_in_related_with(Connective::And, path, field, values, true)
    }

    pub fn where_between_related(
        &mut self,
        path: &str,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query
            .where_between_values(Connective::And, &column, low.into(), high.into(), false);
        Ok(self)
    }

    fn like_related_with(
        &mut self,
        path: &str,
        field: &str,
        value: &str,
        side: LikeSide,
        case_insensitive: bool,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query
            .where_like(Connective::And, &column, value, side, false, case_insensitive);
        Ok(self)
    }

    pub fn like_related(&mut self, path: &str, field: &str, value: &str, side: LikeSide) -> ModelResult<&mut Self> {
        self.like_related_with(path, field, value, side, false)
    }

    pub fn ilike_related(&mut self, path: &str, field: &str, value: &str, side: LikeSide) -> ModelResult<&mut Self> {
        self.like_related_with(path, field, value, side, true)
    }

    pub fn order_by_related(
        &mut self,
        path: &str,
        field: &str,
        direction: Option<OrderDirection>,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query.order_by(&column, direction);
        Ok(self)
    }

    pub fn group_by_related(&mut self, path: &str, field: &str) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let column = Self::related_column(&target, field);
        self.query.group_by(&column);
        Ok(self)
    }

    /// Select related fields as `<path>_<field>`
    pub fn select_related(&mut self, path: &str, fields: &[&str]) -> ModelResult<&mut Self> {
        self.include_related(path, Some(fields), None, false)
    }

    /// `include_related` under its older name
    pub fn join_related(&mut self, path: &str, fields: Option<&[&str]>, instantiate: bool) -> ModelResult<&mut Self> {
        self.include_related(path, fields, None, instantiate)
    }

    /// Join only the join table of a many-to-many relation and qualify
    /// `field` with its alias
    fn join_field_column(&mut self, relation: &str, field: &str) -> ModelResult<String> {
        let target = self.join_path(relation, true)?;
        let join_alias = target.join_table_alias.ok_or_else(|| {
            RelationshipError::Incompatible(format!(
                "'{}' and '{}' have no join table",
                self.schema.model_name, target.schema.model_name
            ))
        })?;
        Ok(format!("{}.{}", join_alias, field.trim()))
    }

    /// Filter on a column of a many-to-many join table
    pub fn where_join_field(&mut self, relation: &str, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        let column = self.join_field_column(relation, field)?;
        self.query
            .where_compare(Connective::And, &column, Some(value.into()), true);
        Ok(self)
    }

    pub fn or_where_join_field(&mut self, relation: &str, field: &str, value: impl Into<Value>) -> ModelResult<&mut Self> {
        let column = self.join_field_column(relation, field)?;
        self.query
            .where_compare(Connective::Or, &column, Some(value.into()), true);
        Ok(self)
    }

    pub fn order_by_join_field(
        &mut self,
        relation: &str,
        field: &str,
        direction: Option<OrderDirection>,
    ) -> ModelResult<&mut Self> {
        let column = self.join_field_column(relation, field)?;
        self.query.order_by(&column, direction);
        Ok(self)
    }

    /// Select a join table column as `join_<field>`
    pub fn select_join_field(&mut self, relation: &str, field: &str) -> ModelResult<&mut Self> {
        let column = self.join_field_column(relation, field)?;
        let alias = self.engine.quote(&format!("join_{}", field.trim()));
        self.query.select_raw(&format!("{} AS {}", column, alias));
        Ok(self)
    }

    /// Filter by the keys of a related instance. An instance holding several
    /// results matches any of them; composite keys compare whole tuples.
    pub fn where_related_instance(&mut self, other: &ModelInstance) -> ModelResult<&mut Self> {
        let target = self.join_steps(&[RelationStep::Instance(other)], false)?;
        let keys: Vec<String> = target
            .schema
            .key_names()
            .iter()
            .map(|k| format!("{}.{}", target.alias, k))
            .collect();

        let tuples: Vec<Vec<Value>> = if other.all.len() > 1 {
            other.all.values().map(ModelInstance::key_values).collect()
        } else {
            vec![other.key_values()]
        };

        match (keys.as_slice(), tuples.as_slice()) {
            ([key], [tuple]) => {
                self.query
                    .where_compare(Connective::And, key, tuple.first().cloned(), true);
            }
            ([key], _) => {
                let values = tuples.iter().filter_map(|t| t.first().cloned()).collect();
                self.query.where_in_values(Connective::And, key, values, false);
            }
            _ => {
                self.query.group_start(Connective::And, false);
                for tuple in &tuples {
                    self.query.group_start(Connective::Or, false);
                    for (key, value) in keys.iter().zip(tuple) {
                        self.query
                            .where_compare(Connective::And, key, Some(value.clone()), true);
                    }
                    self.query.group_end();
                }
                self.query.group_end();
            }
        }
        Ok(self)
    }

    /// Select the fields of a related model, aliased `<prefix>_<field>`.
    ///
    /// `fields` of `None` (or containing `*`) selects every field. The prefix
    /// defaults to the path joined with `_`. With `instantiate`, the fetch
    /// builds the related objects from these columns.
    pub fn include_related(
        &mut self,
        path: &str,
        fields: Option<&[&str]>,
        prefix: Option<&str>,
        instantiate: bool,
    ) -> ModelResult<&mut Self> {
        let target = self.join_path(path, false)?;
        let fields: Vec<String> = match fields {
            Some(fields) if !fields.contains(&"*") => fields.iter().map(|f| f.to_string()).collect(),
            _ => target.schema.fields.clone(),
        };
        let prefix = prefix
            .map(str::to_string)
            .unwrap_or_else(|| target.names.join("_"));

        let mut selects = Vec::with_capacity(fields.len());
        let mut requests = Vec::new();
        for field in &fields {
            let column = if prefix.is_empty() {
                field.clone()
            } else {
                format!("{}_{}", prefix, field)
            };
            selects.push(format!("{}.{} AS {}", target.alias, field, self.engine.quote(&column)));
            if instantiate {
                requests.push(Instantiation {
                    field: field.clone(),
                    column,
                });
            }
        }
        self.query.select(selects);

        if instantiate {
            self.instantiations
                .entry(target.names.join("*"))
                .or_default()
                .extend(requests);
        }
        Ok(self)
    }

    /// Add a correlated `COUNT(*)` of the related rows, selected as `alias`
    /// (`<relation>_count` by default)
    pub fn include_related_count(&mut self, relation: &str, alias: Option<&str>) -> ModelResult<&mut Self> {
        let rel = find(&self.schema, relation)
            .cloned()
            .ok_or_else(|| RelationshipError::NotFound {
                model: self.schema.model_name.clone(),
                relation: relation.to_string(),
            })?;
        let mut subquery = self.engine.model(&rel.related_class)?;
        let inverse = find_inverse(&subquery.schema, &rel)
            .cloned()
            .ok_or_else(|| RelationshipError::NotFound {
                model: subquery.schema.model_name.clone(),
                relation: self.schema.model_name.clone(),
            })?;

        let mut include_join_fields = false;
        let sub_alias = subquery.alias.clone();
        let back = add_join(
            &self.engine,
            &mut subquery.query,
            &sub_alias,
            &inverse,
            &rel,
            false,
            &mut include_join_fields,
        )?;
        subquery.query.select_raw("COUNT(*) AS count");
        for key in &rel.my_key {
            subquery.query.where_compare(
                Connective::And,
                &format!("{}.{} =", back.alias, key),
                Some(Value::String(format!("{}.{}", PARENT_PLACEHOLDER, key))),
                false,
            );
        }

        let alias = alias
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_count", RelationPath::parse(relation).join("_")));
        let sql = subquery.subquery_sql()?;
        self.splice_select_subquery(&sql, &alias)
    }

    /// Select the non-key columns of the next many-to-many join table as
    /// `join_<column>`
    pub fn include_join_fields(&mut self) -> &mut Self {
        self.flags.include_join_fields = true;
        self
    }

    /// Select a subquery as `alias`. `${parent}` inside the subquery refers to
    /// this model's table.
    pub fn select_subquery(&mut self, subquery: &mut ModelInstance, alias: &str) -> ModelResult<&mut Self> {
        if alias.trim().is_empty() {
            return Err(QueryError::InvalidSubquery("select_subquery requires an alias".to_string()).into());
        }
        let sql = subquery.subquery_sql()?;
        self.splice_select_subquery(&sql, alias)
    }

    fn splice_select_subquery(&mut self, sql: &str, alias: &str) -> ModelResult<&mut Self> {
        let sql = self.engine.aliases().rewrite_subquery(sql, &self.alias);
        let select = format!("({}) AS {}", sql, self.engine.quote(alias));
        self.query.select_raw(&select);
        Ok(self)
    }

    /// `WHERE field = (subquery)`; the field may carry its own operator, as in
    /// `"id IN"`
    pub fn where_subquery(&mut self, field: &str, subquery: &mut ModelInstance) -> ModelResult<&mut Self> {
        if field.trim().is_empty() {
            return Err(QueryError::InvalidSubquery("where_subquery requires a field".to_string()).into());
        }
        let column = self.qualify(field);
        let sql = subquery.subquery_sql()?;
        let sql = self.engine.aliases().rewrite_subquery(&sql, &self.alias);
        self.query
            .where_compare(Connective::And, &column, Some(Value::String(format!("({})", sql))), false);
        Ok(self)
    }

    pub fn order_by_subquery(
        &mut self,
        subquery: &mut ModelInstance,
        direction: Option<OrderDirection>,
    ) -> ModelResult<&mut Self> {
        let sql = subquery.subquery_sql()?;
        let sql = self.engine.aliases().rewrite_subquery(&sql, &self.alias);
        self.query.order_by(&format!("({})", sql), direction);
        Ok(self)
    }
}
