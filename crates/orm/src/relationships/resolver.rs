//! Relationship Resolver - relation lookup and join composition

use std::sync::Arc;

use super::metadata::{RelationDef, RelationshipType};
use super::path::RelationStep;
use crate::engine::Engine;
use crate::error::{ModelResult, QueryError, RelationshipError};
use crate::query::QueryBuilder;
use crate::schema::ModelSchema;

/// Where a resolved path ended up
#[derive(Debug, Clone)]
pub struct JoinTarget {
    /// Alias of the last joined table (the join table when only the join
    /// table was requested)
    pub alias: String,
    /// Schema of the last related model
    pub schema: Arc<ModelSchema>,
    /// Last relation, as declared on the model before it
    pub relation: RelationDef,
    /// Its inverse on the related model
    pub inverse: RelationDef,
    /// Alias of the join table of a many-to-many last step
    pub join_table_alias: Option<String>,
    /// Step names, in order
    pub names: Vec<String>,
}

impl JoinTarget {
    pub fn is_many_to_many(&self) -> bool {
        self.relation.is_many_to_many_with(&self.inverse)
    }
}

/// Relation named `name` on `schema`, or the first one towards model `name`
pub fn find<'s>(schema: &'s ModelSchema, name: &str) -> Option<&'s RelationDef> {
    schema.relation(name)
}

/// Inverse of `relation` on the related model's schema
pub fn find_inverse<'s>(related: &'s ModelSchema, relation: &RelationDef) -> Option<&'s RelationDef> {
    if let Some(other) = &relation.other_field {
        return related.relations.by_name(other);
    }
    if let Some(inverse) = related.relations.by_name(&relation.my_class) {
        return Some(inverse);
    }

    let self_referencing = related.model_name == relation.my_class;
    let candidates: Vec<&RelationDef> = related
        .relations
        .iter()
        .filter(|rel| rel.related_class == relation.my_class)
        .filter(|rel| !(self_referencing && rel.name == relation.name))
        .collect();

    candidates
        .iter()
        .find(|rel| compatible(relation.relationship_type, rel.relationship_type))
        .or_else(|| candidates.first())
        .copied()
}

fn compatible(a: RelationshipType, b: RelationshipType) -> bool {
    use RelationshipType::*;
    matches!(
        (a, b),
        (HasMany, HasMany) | (HasMany, BelongsTo) | (HasOne, BelongsTo) | (BelongsTo, HasMany) | (BelongsTo, HasOne)
    )
}

/// Join every step of `steps` into `query`, starting at `start_alias`.
///
/// When `join_only` is set and the last step is many-to-many, only its join
/// table is joined. `include_join_fields` is consumed by the first
/// many-to-many join.
pub fn resolve_path(
    engine: &Engine,
    query: &mut QueryBuilder,
    start: &Arc<ModelSchema>,
    start_alias: &str,
    steps: &[RelationStep<'_>],
    join_only: bool,
    include_join_fields: &mut bool,
) -> ModelResult<JoinTarget> {
    if steps.is_empty() {
        return Err(QueryError::InvalidParameter("empty relation path".to_string()).into());
    }

    // a path leading back to the start model reuses the FROM alias
    query.from(&start.table_name, start_alias);

    let mut current = Arc::clone(start);
    let mut current_alias = start_alias.to_string();
    let mut names = Vec::with_capacity(steps.len());
    let mut target = None;

    for (i, step) in steps.iter().enumerate() {
        let name = step.name();
        let relation = find(&current, name)
            .cloned()
            .ok_or_else(|| RelationshipError::NotFound {
                model: current.model_name.clone(),
                relation: name.to_string(),
            })?;
        let related = match step {
            RelationStep::Instance(instance) if instance.model_name() == relation.related_class => {
                Arc::clone(instance.schema())
            }
            _ => engine.schema(&relation.related_class)?,
        };
        let inverse = find_inverse(&related, &relation)
            .cloned()
            .ok_or_else(|| RelationshipError::NotFound {
                model: related.model_name.clone(),
                relation: current.model_name.clone(),
            })?;

        let last = i + 1 == steps.len();
        let joined = add_join(
            engine,
            query,
            &current_alias,
            &relation,
            &inverse,
            join_only && last,
            include_join_fields,
        )?;

        names.push(name.to_string());
        current_alias = joined.alias.clone();
        current = Arc::clone(&related);
        target = Some(JoinTarget {
            alias: joined.alias,
            schema: related,
            relation,
            inverse,
            join_table_alias: joined.join_table_alias,
            names: Vec::new(),
        });
    }

    // steps is non-empty, so the loop ran at least once
    let mut target = target.ok_or_else(|| QueryError::InvalidParameter("empty relation path".to_string()))?;
    target.names = names;
    Ok(target)
}

/// Aliases produced by [`add_join`]
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub alias: String,
    pub join_table_alias: Option<String>,
}

/// Join the model on the other side of `relation` (declared on the model
/// aliased `current_alias`), `inverse` being the relation back.
pub fn add_join(
    engine: &Engine,
    query: &mut QueryBuilder,
    current_alias: &str,
    relation: &RelationDef,
    inverse: &RelationDef,
    join_only: bool,
    include_join_fields: &mut bool,
) -> ModelResult<JoinOutcome> {
    use RelationshipType::*;

    let target_alias = engine.alias_for(&inverse.related_model);
    let pairs = |left_alias: &str, left: &[String], right_alias: &str, right: &[String]| -> Vec<(String, String)> {
        left.iter()
            .zip(right)
            .map(|(l, r)| (format!("{}.{}", left_alias, l), format!("{}.{}", right_alias, r)))
            .collect()
    };

    match (relation.relationship_type, inverse.relationship_type) {
        (HasMany, HasMany) => {
            if relation.join_table != inverse.join_table {
                return Err(RelationshipError::JoinTableMismatch {
                    left: relation.join_table.clone(),
                    right: inverse.join_table.clone(),
                }
                .into());
            }
            let join_table = &relation.join_table;
            let join_alias = engine.alias_for(join_table);
            query.left_join(
                join_table,
                &join_alias,
                pairs(&join_alias, &relation.related_key, current_alias, &relation.my_key),
            );

            if *include_join_fields {
                add_join_fields(engine, query, &join_alias, relation, inverse)?;
                *include_join_fields = false;
            }

            if join_only {
                tracing::debug!(relation = %relation.name, join_table = %join_table, "joined join table only");
                return Ok(JoinOutcome {
                    alias: join_alias.clone(),
                    join_table_alias: Some(join_alias),
                });
            }

            query.left_join(
                &inverse.my_table,
                &target_alias,
                pairs(&join_alias, &inverse.related_key, &target_alias, &inverse.my_key),
            );
            tracing::debug!(relation = %relation.name, join_table = %join_table, alias = %target_alias, "joined many-to-many relation");
            Ok(JoinOutcome {
                alias: target_alias,
                join_table_alias: Some(join_alias),
            })
        }
        (HasMany | HasOne, BelongsTo) => {
            *include_join_fields = false;
            query.left_join(
                &inverse.my_table,
                &target_alias,
                pairs(current_alias, &relation.my_key, &target_alias, &relation.related_key),
            );
            tracing::debug!(relation = %relation.name, alias = %target_alias, "joined related table");
            Ok(JoinOutcome {
                alias: target_alias,
                join_table_alias: None,
            })
        }
        (BelongsTo, HasMany | HasOne) => {
            *include_join_fields = false;
            query.left_join(
                &inverse.my_table,
                &target_alias,
                pairs(current_alias, &inverse.related_key, &target_alias, &inverse.my_key),
            );
            tracing::debug!(relation = %relation.name, alias = %target_alias, "joined owning table");
            Ok(JoinOutcome {
                alias: target_alias,
                join_table_alias: None,
            })
        }
        (a, b) => Err(RelationshipError::Incompatible(format!(
            "'{}' ({}) and '{}' ({})",
            relation.my_class, a, inverse.my_class, b
        ))
        .into()),
    }
}

/// Select the non-key columns of a join table as `join_<column>`
fn add_join_fields(
    engine: &Engine,
    query: &mut QueryBuilder,
    join_alias: &str,
    relation: &RelationDef,
    inverse: &RelationDef,
) -> ModelResult<()> {
    let columns = engine.join_table_columns(&relation.join_table)?;
    let selects: Vec<String> = columns
        .iter()
        .filter(|c| !relation.related_key.contains(c) && !inverse.related_key.contains(c))
        .map(|c| format!("{}.{} AS {}", join_alias, c, engine.quote(&format!("join_{}", c))))
        .collect();
    query.select(selects);
    Ok(())
}
