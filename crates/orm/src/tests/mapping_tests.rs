//! Mapping and Hydration Tests
//!
//! Rows queued on the mock storage engine are mapped back onto model
//! instances: field copying, get rules, result collections and eager
//! instantiation of related objects.

use std::sync::Arc;

use serde_json::{json, Value};

use super::mock_storage::{register_shop, shop_engine, shop_engine_with, shop_storage, MockStorage};
use crate::config::DataMapperConfig;
use crate::engine::Engine;
use crate::localization::StaticLocalizer;
use crate::model::{Property, ResultKey};
use crate::schema::{FieldValidation, ModelDescriptor};
use crate::validation::GetRuleHandler;

fn order_row(id: Value, name: &str) -> Value {
    json!({"id": id, "customer_id": 1, "name": name, "total": 10})
}

#[test]
fn test_first_row_fills_the_instance() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!("5"), "first"), order_row(json!(6), "second")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();

    // intval is the default get rule of integer keys
    assert_eq!(order.value("id"), Some(&json!(5)));
    assert_eq!(order.value("name"), Some(&json!("first")));
    assert!(order.exists());
    assert_eq!(order.result_count(), 2);

    let all: Vec<_> = order.all().values().collect();
    assert_eq!(all[0].value("id"), Some(&json!(5)));
    assert_eq!(all[1].value("name"), Some(&json!("second")));
    assert!(all[0].all().is_empty());
}

#[test]
fn test_missing_columns_are_null() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![json!({"id": 1, "name": "partial"})]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();

    assert_eq!(order.value("total"), Some(&Value::Null));
    assert_eq!(order.value("customer_id"), Some(&Value::Null));
}

#[test]
fn test_original_values_follow_the_fetch() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(1), "before")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();
    assert!(order.changed_fields().is_empty());

    order.set("name", "after");
    assert_eq!(order.changed_fields(), vec!["name"]);
    assert_eq!(order.original_value("name"), Some(&json!("before")));
}

#[test]
fn test_declared_get_rules_run_on_non_null_values() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![
        json!({"id": 1, "customer_id": 1, "name": "  padded  ", "total": 1}),
        json!({"id": 2, "customer_id": 1, "name": null, "total": 1}),
    ]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();

    let all: Vec<_> = order.all().values().collect();
    assert_eq!(all[0].value("name"), Some(&json!("padded")));
    assert_eq!(all[1].value("name"), Some(&Value::Null));
}

struct Shout;

impl GetRuleHandler for Shout {
    fn apply(&self, rule: &str, _field: &str, value: &Value) -> Option<Value> {
        match (rule, value) {
            ("shout", Value::String(s)) => Some(Value::String(s.to_uppercase())),
            _ => None,
        }
    }
}

#[test]
fn test_custom_get_rules_go_to_the_handler() {
    let storage = Arc::new(shop_storage());
    let engine = Engine::builder(storage.clone())
        .get_rule_handler(Arc::new(Shout))
        .build();
    engine
        .register(
            ModelDescriptor::new("customer")
                .validate("name", FieldValidation::new().get_rule("shout").get_rule("no_such_rule")),
        )
        .unwrap();

    storage.push_rows(vec![json!({"id": 1, "name": "quiet"})]);
    let mut customer = engine.model("customer").unwrap();
    customer.get().unwrap();

    // unknown rules leave the value alone
    assert_eq!(customer.value("name"), Some(&json!("QUIET")));
}

#[test]
fn test_matches_rule_copies_the_matched_field() {
    let storage = Arc::new(MockStorage::new().with_table("accounts", &["id", "password", "confirm_password"]));
    let engine = Engine::new(storage.clone());
    engine
        .register(
            ModelDescriptor::new("account")
                .validate("confirm_password", FieldValidation::new().matches("password")),
        )
        .unwrap();

    storage.push_rows(vec![json!({"id": 1, "password": "secret", "confirm_password": null})]);
    let mut account = engine.model("account").unwrap();
    account.get().unwrap();

    assert_eq!(account.value("confirm_password"), Some(&json!("secret")));
    assert_eq!(account.original_value("confirm_password"), Some(&json!("secret")));
}

#[test]
fn test_results_keyed_by_primary_key() {
    let config = DataMapperConfig {
        all_array_uses_keys: true,
        ..Default::default()
    };
    let (engine, storage) = shop_engine_with(config);
    storage.push_rows(vec![order_row(json!(7), "a"), order_row(json!(3), "b")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();

    let keys: Vec<_> = order.all().keys().cloned().collect();
    assert_eq!(keys, vec![ResultKey::Key("7".into()), ResultKey::Key("3".into())]);
}

#[test]
fn test_composite_keys_index_by_position() {
    let config = DataMapperConfig {
        all_array_uses_keys: true,
        ..Default::default()
    };
    let (engine, storage) = shop_engine_with(config);
    storage.push_rows(vec![
        json!({"group_id": 1, "user_id": 2, "role": "admin"}),
        json!({"group_id": 1, "user_id": 3, "role": "member"}),
    ]);

    let mut membership = engine.model("membership").unwrap();
    membership.get().unwrap();

    let keys: Vec<_> = membership.all().keys().cloned().collect();
    assert_eq!(keys, vec![ResultKey::Position(0), ResultKey::Position(1)]);
}

#[test]
fn test_empty_result_clears_previous_values() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(1), "a")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();
    assert!(order.exists());

    order.where_eq("id", 2).get().unwrap();
    assert!(!order.exists());
    assert_eq!(order.value("name"), Some(&Value::Null));
    assert_eq!(order.result_count(), 0);
}

#[test]
fn test_large_results_are_released() {
    let config = DataMapperConfig {
        free_result_threshold: 1,
        ..Default::default()
    };
    let (engine, storage) = shop_engine_with(config);
    storage.push_rows(vec![order_row(json!(1), "a")]);
    storage.push_rows(vec![order_row(json!(1), "a"), order_row(json!(2), "b")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();
    assert_eq!(storage.freed(), 0);

    order.get().unwrap();
    assert_eq!(storage.freed(), 1);
    assert_eq!(order.result_count(), 2);
}

#[test]
fn test_include_related_instantiates_objects() {
    let (engine, storage) = shop_engine();
    let mut order = engine.model("order").unwrap();
    let o = order.alias().to_string();
    let c = engine.alias_for("customer");

    storage.push_rows(vec![json!({
        "id": 1, "customer_id": 9, "name": "A", "total": 10, "customer_name": "Zed"
    })]);
    order.include_related("customer", Some(&["name"]), None, true).unwrap();
    order.get().unwrap();

    assert_eq!(
        storage.last_sql(),
        format!(
            "SELECT {o}.*, {c}.name AS \"customer_name\" FROM orders {o} \
             LEFT OUTER JOIN customers {c} ON {o}.customer_id = {c}.id"
        )
    );
    assert_eq!(order.value("customer_name"), None);

    let customer = order.related("customer").unwrap();
    assert_eq!(customer.value("name"), Some(&json!("Zed")));
    assert_eq!(customer.value("id"), Some(&Value::Null));
    // nothing else was queried
    assert_eq!(storage.executed().len(), 1);
}

#[test]
fn test_include_related_without_instantiation_keeps_columns() {
    let (engine, storage) = shop_engine();
    let mut order = engine.model("order").unwrap();

    storage.push_rows(vec![json!({
        "id": 1, "customer_id": 9, "name": "A", "total": 10, "buyer_name": "Zed"
    })]);
    order.include_related("customer", Some(&["name"]), Some("buyer"), false).unwrap();
    order.get().unwrap();

    assert!(storage.last_sql().contains("AS \"buyer_name\""));
    assert_eq!(order.value("buyer_name"), Some(&json!("Zed")));
}

#[test]
fn test_nested_instantiation() {
    let (engine, storage) = shop_engine();
    let mut item = engine.model("item").unwrap();

    storage.push_rows(vec![json!({
        "id": 4, "order_id": 1, "sku": "A", "qty": 1,
        "order_customer_name": "Zed"
    })]);
    item.include_related("order/customer", Some(&["name"]), None, true).unwrap();
    item.get().unwrap();

    let customer = item.related("order").unwrap().related("customer").unwrap();
    assert_eq!(customer.value("name"), Some(&json!("Zed")));
}

#[test]
fn test_get_iterated_maps_lazily() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(1), "a"), order_row(json!(2), "b")]);

    let mut order = engine.model("order").unwrap();
    let iter = order.where_eq("total", 10).get_iterated(None, None).unwrap();
    assert_eq!(iter.len(), 2);

    let names: Vec<Value> = iter
        .map(|item| item.unwrap().value("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![json!("a"), json!("b")]);
    assert!(!order.exists());
}

#[test]
fn test_raw_query_maps_rows() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(8), "raw")]);

    let mut order = engine.model("order").unwrap();
    order.query("SELECT * FROM orders WHERE id = $1", &[json!(8)]).unwrap();

    assert_eq!(storage.last_sql(), "SELECT * FROM orders WHERE id = $1");
    assert_eq!(order.value("id"), Some(&json!(8)));
}

#[test]
fn test_property_lookup() {
    let (engine, _) = shop_engine();
    let mut order = engine.model("order").unwrap();
    order.set("name", "A");

    assert_eq!(order.property("name").unwrap().as_value(), Some(&json!("A")));
    assert!(order.property("total").unwrap().is_null());
    assert!(order.property("nothing").unwrap().is_null());

    let items = order.property("items").unwrap().into_related().unwrap();
    assert_eq!(items.model_name(), "item");
    assert!(matches!(order.property("item").unwrap(), Property::Related(_)));
}

#[test]
fn test_copy_does_not_exist() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(1), "a")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();

    let copy = order.get_copy();
    assert_eq!(copy.value("id"), Some(&Value::Null));
    assert_eq!(copy.value("name"), Some(&json!("a")));
    assert!(!copy.exists());

    let clone = order.get_clone();
    assert!(clone.exists());
}

#[test]
fn test_refresh_all_drops_missing_entries() {
    let (engine, storage) = shop_engine();
    storage.push_rows(vec![order_row(json!(1), "a"), order_row(json!(2), "b")]);

    let mut order = engine.model("order").unwrap();
    order.get().unwrap();
    if let Some(second) = order.all_mut().get_index_mut(1) {
        second.1.set("id", Value::Null);
    }

    assert!(order.refresh_all());
    assert_eq!(order.result_count(), 1);
}

#[test]
fn test_labels() {
    let storage = Arc::new(shop_storage());
    let localizer = StaticLocalizer::new()
        .with_line("order_total", "Total amount")
        .with_line("customer_ref", "Customer");
    let engine = Engine::builder(storage).localizer(Arc::new(localizer)).build();
    register_shop(&engine);
    engine
        .register(
            ModelDescriptor::new("order")
                .validate("name", FieldValidation::new().label("Order name"))
                .validate("customer_id", FieldValidation::new().label("lang:customer_ref")),
        )
        .unwrap();

    let order = engine.model("order").unwrap();
    assert_eq!(order.label("name"), "Order name");
    assert_eq!(order.label("customer_id"), "Customer");
    assert_eq!(order.label("total"), "Total amount");
    assert_eq!(order.label("id"), "id");
    assert_eq!(order.to_string(), "Order");
}
