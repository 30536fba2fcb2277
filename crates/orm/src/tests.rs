//! Crate-level tests
//!
//! Everything runs against `MockStorage`, which records the SQL it is handed
//! and replays queued rows, so no database is needed.

pub mod mapping_tests;
pub mod schema_tests;

#[cfg(test)]
mod query_builder_tests {
    use serde_json::json;

    use super::mock_storage::shop_engine;
    use crate::error::{ModelError, ModelResult};
    use crate::model::ModelInstance;
    use crate::query::{FuncArg, LikeSide, OrderDirection};

    #[test]
    fn test_plain_select() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        let sql = order.get_sql(None, None).unwrap();
        assert_eq!(sql, format!("SELECT {o}.* FROM orders {o}"));
    }

    #[test]
    fn test_where_with_operators_and_or() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.where_eq("name", "A").or_where_eq("total >", 10);
        let sql = order.get_sql(None, None).unwrap();
        assert_eq!(
            sql,
            format!("SELECT {o}.* FROM orders {o} WHERE {o}.name = 'A' OR {o}.total > 10")
        );
    }

    #[test]
    fn test_null_comparisons() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.where_null("customer_id").where_not_null("name");
        let sql = order.get_sql(None, None).unwrap();
        assert!(sql.ends_with(&format!(
            "WHERE {o}.customer_id IS NULL AND {o}.name IS NOT NULL"
        )));
    }

    #[test]
    fn test_groups() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order
            .where_eq("name", "a")
            .group_start()
            .where_eq("total", 1)
            .or_where_eq("total", 2)
            .group_end()
            .or_not_group_start()
            .where_eq("customer_id", 3)
            .group_end();
        let sql = order.get_sql(None, None).unwrap();
        assert!(sql.ends_with(&format!(
            "WHERE {o}.name = 'a' AND ({o}.total = 1 OR {o}.total = 2) OR NOT ({o}.customer_id = 3)"
        )));
    }

    #[test]
    fn test_empty_group_disappears() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.group_start().group_end().where_eq("name", "a");
        let sql = order.get_sql(None, None).unwrap();
        assert_eq!(sql, format!("SELECT {o}.* FROM orders {o} WHERE {o}.name = 'a'"));
    }

    #[test]
    fn test_unbalanced_group_is_a_query_error() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();

        order.group_start().where_eq("name", "a");
        let err = order.get().unwrap_err();
        assert!(err.is_query());
        assert!(storage.executed().is_empty());
    }

    #[test]
    fn test_in_between_and_like() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order
            .where_in("id", vec![json!(1), json!(2)])
            .where_not_between("total", 1, 5)
            .like("name", "ab%", LikeSide::Both)
            .or_ilike("name", "cd", LikeSide::After);
        let sql = order.get_sql(None, None).unwrap();
        assert!(sql.ends_with(&format!(
            "WHERE {o}.id IN (1, 2) AND {o}.total NOT BETWEEN 1 AND 5 \
             AND {o}.name LIKE '%ab!%%' ESCAPE '!' OR UPPER({o}.name) LIKE 'CD%' ESCAPE '!'"
        )));
    }

    #[test]
    fn test_empty_in_list_adds_nothing() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();

        order.where_in("id", Vec::new());
        let sql = order.get_sql(None, None).unwrap();
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_raw_condition_fields_are_qualified() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.where_raw("name = 'x' and total > 1");
        let sql = order.get_sql(None, None).unwrap();
        assert!(sql.ends_with(&format!("WHERE {o}.name = 'x' AND {o}.total > 1")));
    }

    #[test]
    fn test_aggregates_group_by_and_having() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order
            .select(&["customer_id"])
            .select_sum("total", Some("sum"))
            .group_by("customer_id")
            .having("customer_id >", 1);
        let sql = order.get_sql(None, None).unwrap();
        assert_eq!(
            sql,
            format!(
                "SELECT {o}.customer_id, SUM({o}.total) AS \"sum\" FROM orders {o} \
                 GROUP BY {o}.customer_id HAVING {o}.customer_id > 1"
            )
        );
    }

    #[test]
    fn test_select_func_and_distinct() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order
            .distinct(true)
            .select_func("concat", &[FuncArg::Field("name".into()), FuncArg::Literal(json!("-"))], "label");
        let sql = order.get_sql(None, None).unwrap();
        assert_eq!(
            sql,
            format!("SELECT DISTINCT CONCAT({o}.name, '-') AS \"label\" FROM orders {o}")
        );
    }

    #[test]
    fn test_limit_offset_and_order() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.order_by("total", Some(OrderDirection::Desc)).order_by("name", None);
        let sql = order.get_sql(Some(10), Some(20)).unwrap();
        assert!(sql.ends_with(&format!(
            "ORDER BY {o}.total DESC, {o}.name LIMIT 10 OFFSET 20"
        )));
    }

    #[test]
    fn test_default_order_applies_to_plain_selects_only() {
        let (engine, _) = shop_engine();
        let mut item = engine.model("item").unwrap();
        let i = item.alias().to_string();

        let sql = item.get_sql(None, None).unwrap();
        assert_eq!(sql, format!("SELECT {i}.* FROM items {i} ORDER BY {i}.sku ASC"));

        item.select_max("qty", None);
        let sql = item.get_sql(None, None).unwrap();
        assert_eq!(sql, format!("SELECT MAX({i}.qty) FROM items {i}"));

        item.order_by("qty", Some(OrderDirection::Desc));
        let sql = item.get_sql(None, None).unwrap();
        assert!(sql.ends_with(&format!("ORDER BY {i}.qty DESC")));
    }

    #[test]
    fn test_pending_query_is_consumed() {
        let (engine, _) = shop_engine();
        let mut order = engine.model("order").unwrap();

        order.where_eq("name", "a");
        order.get_sql(None, None).unwrap();
        assert!(!order.query_builder().has_where());
    }

    #[test]
    fn test_count_drops_order_and_limit() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        storage.push_rows(vec![json!({"numrows": 4})]);
        order.where_eq("total >", 5).order_by("name", None).limit(3);
        assert_eq!(order.count(&[], &[]).unwrap(), 4);
        assert_eq!(
            storage.last_sql(),
            format!("SELECT COUNT(*) AS \"numrows\" FROM orders {o} WHERE {o}.total > 5")
        );
        assert!(!order.query_builder().has_where());
    }

    #[test]
    fn test_count_accepts_string_numbers() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();

        storage.push_rows(vec![json!({"numrows": "7"})]);
        assert_eq!(order.count(&[], &[]).unwrap(), 7);

        // no rows at all counts as zero
        assert_eq!(order.count(&[], &[]).unwrap(), 0);
    }

    #[test]
    fn test_count_excludes_single_keys() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.count(&[vec![json!(1)], vec![json!(2)]], &[]).unwrap();
        assert!(storage
            .last_sql()
            .ends_with(&format!("WHERE {o}.id NOT IN (1, 2)")));
    }

    #[test]
    fn test_count_excludes_composite_keys() {
        let (engine, storage) = shop_engine();
        let mut membership = engine.model("membership").unwrap();
        let m = membership.alias().to_string();

        membership
            .count(&[vec![json!(1), json!(2)], vec![json!(3), json!(4)], vec![json!(5)]], &[])
            .unwrap();
        assert_eq!(
            storage.last_sql(),
            format!(
                "SELECT COUNT(*) AS \"numrows\" FROM memberships {m} WHERE \
                 NOT (({m}.group_id = 1 AND {m}.user_id = 2) OR ({m}.group_id = 3 AND {m}.user_id = 4))"
            )
        );
    }

    #[test]
    fn test_count_distinct_defaults_to_key() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.count_distinct(&[], None).unwrap();
        assert_eq!(
            storage.last_sql(),
            format!("SELECT COUNT(DISTINCT {o}.id) AS \"numrows\" FROM orders {o}")
        );
    }

    #[test]
    fn test_validated_get_filters_by_set_fields() {
        let (engine, storage) = shop_engine();
        let mut order = engine.model("order").unwrap();
        let o = order.alias().to_string();

        order.set("name", "A");
        let hook = |_: &ModelInstance| -> ModelResult<bool> { Ok(true) };
        assert!(order.validate_with(&hook).unwrap());
        order.where_eq("total", 99);
        order.get().unwrap();

        assert_eq!(
            storage.last_sql(),
            format!("SELECT {o}.* FROM orders {o} WHERE {o}.name = 'A'")
        );
        assert!(!order.is_validated());
    }

    #[test]
    fn test_find_by_key() {
        let (engine, storage) = shop_engine();
        storage.push_rows(vec![json!({"id": 3, "customer_id": 1, "name": "A", "total": 10})]);

        let order = engine.find("order", &[json!(3)]).unwrap();
        let o = order.alias().to_string();
        assert_eq!(order.value("id"), Some(&json!(3)));
        assert_eq!(
            storage.last_sql(),
            format!("SELECT {o}.* FROM orders {o} WHERE {o}.id = 3")
        );
    }

    #[test]
    fn test_find_with_wrong_key_count() {
        let (engine, _) = shop_engine();
        let err = engine.find("order", &[json!(1), json!(2)]).unwrap_err();
        assert!(err.is_query());
    }

    #[test]
    fn test_unregistered_model() {
        let (engine, _) = shop_engine();
        let err = engine.model("invoice").unwrap_err();
        assert_eq!(err, ModelError::NotFound("invoice".to_string()));
    }

    #[test]
    fn test_aliases_are_stable_per_model() {
        let (engine, _) = shop_engine();
        let first = engine.model("order").unwrap();
        let second = engine.model("Order").unwrap();
        let item = engine.model("item").unwrap();

        assert_eq!(first.alias(), second.alias());
        assert_ne!(first.alias(), item.alias());
        assert!(first.alias().starts_with("TA_"));
    }
}
