//! Schema registry tests: lazy builds, the schema cache and descriptor errors

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::mock_storage::{register_shop, shop_engine, shop_storage, MemorySchemaCache, MockStorage};
use crate::config::DataMapperConfig;
use crate::engine::Engine;
use crate::error::ModelError;
use crate::relationships::RelationshipType;
use crate::schema::{KeyType, ModelDescriptor, RelationOptions};

fn cached_engine(storage: &Arc<MockStorage>, cache: &Arc<MemorySchemaCache>, config: &DataMapperConfig) -> Engine {
    let engine = Engine::builder(storage.clone())
        .config(config.clone())
        .cache_store(cache.clone())
        .build();
    register_shop(&engine);
    engine
}

#[test]
fn test_schema_is_built_lazily_and_once() {
    let (engine, storage) = shop_engine();
    assert_eq!(storage.describe_calls(), 0);

    let first = engine.schema("order").unwrap();
    let second = engine.schema("ORDER").unwrap();
    engine.model("order").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(storage.describe_calls(), 1);
    assert!(engine.registry().is_built("order"));
    assert!(!engine.registry().is_built("item"));
}

#[test]
fn test_concurrent_first_use_builds_once() {
    let (engine, storage) = shop_engine();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || engine.schema("order").unwrap())
        })
        .collect();
    let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(schemas.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(storage.describe_calls(), 1);
}

#[test]
fn test_built_schema_contents() {
    let (engine, _) = shop_engine();
    let order = engine.schema("order").unwrap();

    assert_eq!(order.table_name, "orders");
    assert_eq!(order.fields, vec!["id", "customer_id", "name", "total"]);
    assert_eq!(order.key_names(), vec!["id"]);
    assert_eq!(order.get_rules("id"), ["intval".to_string()]);
    assert_eq!(order.validation.len(), 4);

    let item = &order.relations.has_many["item"];
    assert_eq!(item.relationship_type, RelationshipType::HasMany);
    assert_eq!(item.related_class, "item");
    assert_eq!(item.my_class, "order");
    assert_eq!(item.my_table, "orders");
    assert_eq!(item.my_key, vec!["id"]);
    assert_eq!(item.related_key, vec!["order_id"]);
    assert_eq!(item.join_table, "items_orders");
    assert!(item.cascade_delete);

    let membership = engine.schema("membership").unwrap();
    assert_eq!(membership.key_names(), vec!["group_id", "user_id"]);
}

#[test]
fn test_prefixes_apply_to_every_table() {
    let storage = Arc::new(
        MockStorage::new()
            .with_table("shop_orders", &["id"])
            .with_table("shop_legacy_items", &["id", "order_id"]),
    );
    let config = DataMapperConfig {
        prefix: "shop_".into(),
        join_prefix: "jt_".into(),
        ..Default::default()
    };
    let engine = Engine::builder(storage).config(config).build();
    engine
        .register(ModelDescriptor::new("order").has_many("item", RelationOptions::new().related_key(["order_id"])))
        .unwrap();
    engine
        .register(ModelDescriptor::new("item").table("legacy_items").belongs_to("order", RelationOptions::new()))
        .unwrap();

    let order = engine.schema("order").unwrap();
    assert_eq!(order.table_name, "shop_orders");
    assert_eq!(order.relations.has_many["item"].join_table, "jt_items_orders");
    assert_eq!(engine.schema("item").unwrap().table_name, "shop_legacy_items");
}

#[test]
fn test_cache_entry_within_expiration_is_reused() {
    let storage = Arc::new(shop_storage());
    let cache = Arc::new(MemorySchemaCache::new());
    let config = DataMapperConfig {
        cache_expiration: 60,
        ..Default::default()
    };

    let first = cached_engine(&storage, &cache, &config);
    let built = first.schema("order").unwrap();
    assert_eq!(storage.describe_calls(), 1);
    assert_eq!(cache.saves(), 1);

    cache.set_age(Duration::from_secs(30));
    let second = cached_engine(&storage, &cache, &config);
    let cached = second.schema("order").unwrap();
    assert_eq!(storage.describe_calls(), 1);
    assert_eq!(*cached, *built);

    cache.set_age(Duration::from_secs(90));
    let third = cached_engine(&storage, &cache, &config);
    third.schema("order").unwrap();
    assert_eq!(storage.describe_calls(), 2);
    assert_eq!(cache.saves(), 2);
}

#[test]
fn test_cache_without_expiration_never_expires() {
    let storage = Arc::new(shop_storage());
    let cache = Arc::new(MemorySchemaCache::new());
    let config = DataMapperConfig::default();

    cached_engine(&storage, &cache, &config).schema("order").unwrap();
    cache.set_age(Duration::from_secs(365 * 24 * 3600));
    cached_engine(&storage, &cache, &config).schema("order").unwrap();

    assert_eq!(storage.describe_calls(), 1);
}

#[test]
fn test_corrupt_cache_entry_is_rebuilt() {
    let storage = Arc::new(shop_storage());
    let cache = Arc::new(MemorySchemaCache::new());
    cache.corrupt("order");

    let engine = cached_engine(&storage, &cache, &DataMapperConfig::default());
    let schema = engine.schema("order").unwrap();

    assert_eq!(schema.table_name, "orders");
    assert_eq!(storage.describe_calls(), 1);
    assert_eq!(cache.saves(), 1);
}

#[test]
fn test_failed_build_is_not_cached() {
    let storage = Arc::new(MockStorage::new());
    let cache = Arc::new(MemorySchemaCache::new());
    let engine = Engine::builder(storage.clone()).cache_store(cache.clone()).build();
    engine.register(ModelDescriptor::new("order")).unwrap();

    let err = engine.schema("order").unwrap_err();
    assert!(err.is_storage());
    assert_eq!(cache.saves(), 0);
    assert!(!engine.registry().is_built("order"));

    // a later attempt goes back to the storage engine
    assert!(engine.schema("order").is_err());
    assert_eq!(storage.describe_calls(), 2);
}

#[test]
fn test_file_cache_from_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = DataMapperConfig::from_json_str(
        &json!({"cache_path": dir.path().to_str().unwrap()}).to_string(),
    )
    .unwrap();
    let storage = Arc::new(shop_storage());
    let engine = Engine::builder(storage).config(config).build();
    register_shop(&engine);

    engine.schema("order").unwrap();
    assert!(dir.path().join("order.json").exists());
}

#[test]
fn test_missing_key_field() {
    let storage = Arc::new(shop_storage());
    let engine = Engine::new(storage);
    engine
        .register(ModelDescriptor::new("order").primary_key("uuid", KeyType::String))
        .unwrap();

    let err = engine.schema("order").unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("uuid"));
}

#[test]
fn test_has_relations_need_related_key() {
    let storage = Arc::new(shop_storage());
    let engine = Engine::new(storage);
    engine
        .register(ModelDescriptor::new("customer").has_many("order", RelationOptions::new()))
        .unwrap();

    assert!(engine.schema("customer").unwrap_err().is_configuration());
}

#[test]
fn test_key_lists_must_pair_up() {
    let storage = Arc::new(shop_storage());
    let engine = Engine::new(storage);
    engine
        .register(
            ModelDescriptor::new("customer")
                .has_many("order", RelationOptions::new().related_key(["customer_id", "region_id"])),
        )
        .unwrap();

    assert!(engine.schema("customer").unwrap_err().is_configuration());
}

#[test]
fn test_unknown_override_is_rejected_at_registration() {
    let (engine, _) = shop_engine();
    let err = engine
        .register(ModelDescriptor::new("order").config_override("colour", json!("red")))
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_override_with_wrong_type_fails_the_build() {
    let (engine, _) = shop_engine();
    engine
        .register(ModelDescriptor::new("order").config_override("auto_populate_has_many", json!("yes")))
        .unwrap();

    assert!(engine.schema("order").unwrap_err().is_configuration());
}

#[test]
fn test_override_is_per_model() {
    let (engine, _) = shop_engine();
    engine
        .register(ModelDescriptor::new("customer").config_override("auto_populate_has_many", json!(true)))
        .unwrap();

    assert!(engine.schema("customer").unwrap().config.auto_populate_has_many);
    assert!(!engine.schema("order").unwrap().config.auto_populate_has_many);
    assert!(!engine.config().auto_populate_has_many);
}

#[test]
fn test_register_json_descriptor() {
    let (engine, storage) = shop_engine();
    engine
        .register_json(&json!({
            "model": "Order",
            "keys": ["id"],
            "has_many": {"item": {"related_key": "order_id"}},
            "belongs_to": ["customer"],
            "default_order_by": {"total": "desc"}
        }))
        .unwrap();

    let mut order = engine.model("order").unwrap();
    let o = order.alias().to_string();
    order.get().unwrap();
    assert_eq!(
        storage.last_sql(),
        format!("SELECT {o}.* FROM orders {o} ORDER BY {o}.total DESC")
    );
}

#[test]
fn test_register_json_rejects_unknown_keys() {
    let (engine, _) = shop_engine();
    let err = engine
        .register_json(&json!({"model": "order", "extensions": ["json"]}))
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::Configuration("Unknown configuration key 'extensions'".to_string())
    );
}

#[test]
fn test_self_referencing_relation() {
    let storage = Arc::new(MockStorage::new().with_table("employees", &["id", "manager_id", "name"]));
    let engine = Engine::new(storage);
    engine
        .register(
            ModelDescriptor::new("employee")
                .has_many(
                    "report",
                    RelationOptions::new()
                        .related_class("employee")
                        .related_key(["manager_id"])
                        .other_field("manager"),
                )
                .belongs_to(
                    "manager",
                    RelationOptions::new()
                        .related_class("employee")
                        .other_field("report"),
                ),
        )
        .unwrap();

    let mut boss = engine.model("employee").unwrap();
    let e = boss.alias().to_string();
    boss.set("id", 1);
    let reports = boss.related("report").unwrap();
    let sql = reports.get_sql(None, None).unwrap();
    assert_eq!(sql, format!("SELECT {e}.* FROM employees {e} WHERE {e}.manager_id = 1"));
}
