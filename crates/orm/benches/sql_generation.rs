//! SQL generation benchmarks
//!
//! Measures query compilation for plain, filtered and relation-heavy selects,
//! plus row mapping onto instances. Nothing touches a database.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use datamapper_orm::{
    ColumnInfo, Engine, ModelDescriptor, ModelError, OrmResult, QueryResult, RelationOptions, ResultRow,
    StorageEngine,
};
use serde_json::{json, Value};

struct StaticStorage {
    tables: HashMap<&'static str, Vec<&'static str>>,
    rows: Vec<ResultRow>,
}

impl StorageEngine for StaticStorage {
    fn describe_columns(&self, table: &str) -> OrmResult<Vec<ColumnInfo>> {
        self.tables
            .get(table)
            .map(|columns| columns.iter().map(|c| ColumnInfo::new(*c, "text")).collect())
            .ok_or_else(|| ModelError::Storage(format!("unknown table {}", table)))
    }

    fn execute(&self, _sql: &str, _binds: &[Value]) -> OrmResult<QueryResult> {
        Ok(QueryResult::new(self.rows.clone()))
    }
}

fn engine_with_rows(row_count: usize) -> Engine {
    let rows = (0..row_count)
        .map(|i| {
            json!({"id": i, "customer_id": i % 7, "name": format!("order {}", i), "total": i * 3})
                .as_object()
                .map(|row| row.clone().into_iter().collect())
                .unwrap_or_default()
        })
        .collect();
    let storage = StaticStorage {
        tables: HashMap::from([
            ("customers", vec!["id", "name", "region_id"]),
            ("regions", vec!["id", "name"]),
            ("orders", vec!["id", "customer_id", "name", "total"]),
            ("items", vec!["id", "order_id", "sku", "qty"]),
        ]),
        rows,
    };

    let engine = Engine::new(Arc::new(storage));
    let descriptors = [
        ModelDescriptor::new("region").has_many("customer", RelationOptions::new().related_key(["region_id"])),
        ModelDescriptor::new("customer")
            .belongs_to("region", RelationOptions::new())
            .has_many("order", RelationOptions::new().related_key(["customer_id"])),
        ModelDescriptor::new("order")
            .belongs_to("customer", RelationOptions::new())
            .has_many("item", RelationOptions::new().related_key(["order_id"])),
        ModelDescriptor::new("item").belongs_to("order", RelationOptions::new()),
    ];
    for descriptor in descriptors {
        engine.register(descriptor).expect("valid descriptor");
    }
    engine
}

fn bench_basic_sql_generation(c: &mut Criterion) {
    let engine = engine_with_rows(0);
    let mut group = c.benchmark_group("basic_sql_generation");

    group.bench_function("simple_select", |b| {
        let mut order = engine.model("order").unwrap();
        b.iter(|| black_box(order.get_sql(None, None).unwrap()))
    });

    group.bench_function("select_with_where", |b| {
        let mut order = engine.model("order").unwrap();
        b.iter(|| {
            order
                .where_eq("name", "A")
                .where_eq("total >", 10)
                .group_start()
                .where_null("customer_id")
                .or_where_in("customer_id", vec![json!(1), json!(2), json!(3)])
                .group_end();
            black_box(order.get_sql(Some(50), Some(100)).unwrap())
        })
    });

    group.bench_function("select_with_raw_condition", |b| {
        let mut order = engine.model("order").unwrap();
        b.iter(|| {
            order.where_raw("name = 'x' and total > 1 or customer_id is null");
            black_box(order.get_sql(None, None).unwrap())
        })
    });

    group.finish();
}

fn bench_relation_sql_generation(c: &mut Criterion) {
    let engine = engine_with_rows(0);
    let mut group = c.benchmark_group("relation_sql_generation");

    for path in ["order", "order/customer", "order/customer/region"] {
        group.bench_with_input(BenchmarkId::new("where_related", path), &path, |b, path| {
            let mut item = engine.model("item").unwrap();
            b.iter(|| {
                item.where_related(path, "id", 1).unwrap();
                black_box(item.get_sql(None, None).unwrap())
            })
        });
    }

    group.bench_function("child_of_grandparent", |b| {
        let mut customer = engine.model("customer").unwrap();
        customer.set("id", 4);
        let order = customer.related("order").unwrap();
        order.set("id", 9);
        let item = order.related("item").unwrap();
        b.iter(|| black_box(item.get_sql(None, None).unwrap()))
    });

    group.bench_function("include_related_count", |b| {
        let mut customer = engine.model("customer").unwrap();
        b.iter(|| {
            customer.include_related_count("order", None).unwrap();
            black_box(customer.get_sql(None, None).unwrap())
        })
    });

    group.finish();
}

fn bench_row_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_mapping");

    for row_count in [1usize, 50, 500] {
        let engine = engine_with_rows(row_count);
        group.bench_with_input(BenchmarkId::new("get", row_count), &row_count, |b, _| {
            let mut order = engine.model("order").unwrap();
            b.iter(|| {
                order.get().unwrap();
                black_box(order.result_count())
            })
        });
        group.bench_with_input(BenchmarkId::new("get_iterated", row_count), &row_count, |b, _| {
            let mut order = engine.model("order").unwrap();
            b.iter(|| {
                let mapped = order
                    .get_iterated(None, None)
                    .unwrap()
                    .filter_map(Result::ok)
                    .count();
                black_box(mapped)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_basic_sql_generation,
    bench_relation_sql_generation,
    bench_row_mapping
);
criterion_main!(benches);
