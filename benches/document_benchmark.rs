use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;
use searchsync::cascade::{plan_update_cascades, CascadeContext};
use searchsync::core::config::SearchConfig;
use searchsync::core::entity::*;
use searchsync::core::types::{ChangeDescription, EntityReference, FieldChange};
use searchsync::diff::{inherited_field_changes, plan_document_write};
use searchsync::document::DocumentBuilderRegistry;
use searchsync::schema::registry::IndexMappingRegistry;

/// Helper to create a table with `column_count` random columns
fn create_test_table(column_count: usize) -> EntityRecord {
    let mut rng = rand::thread_rng();
    let types = ["INT", "BIGINT", "VARCHAR", "TIMESTAMP", "BOOLEAN", "DECIMAL"];
    let columns: Vec<Value> = (0..column_count)
        .map(|i| {
            json!({
                "name": format!("col_{}", i),
                "dataType": types[rng.gen_range(0..types.len())],
                "description": format!("column {} of the benchmark table", i),
            })
        })
        .collect();

    let owner = EntityReference::new(Uuid::new_v4(), USER).with_name("alice");
    EntityRecord::new(TABLE, "orders", "warehouse.sales.public.orders")
        .with_owners(vec![owner])
        .with_attribute(FIELD_DESCRIPTION, json!("orders placed online"))
        .with_attribute("columns", Value::Array(columns))
        .with_attribute(FIELD_TAGS, json!([{"tagFQN": "PII.Sensitive", "source": "Classification"}]))
}

fn bench_document_build(c: &mut Criterion) {
    let builders = DocumentBuilderRegistry::new();
    let mut group = c.benchmark_group("document_build");

    for columns in [10, 100, 1000].iter() {
        let table = create_test_table(*columns);
        group.bench_with_input(BenchmarkId::from_parameter(columns), columns, |b, _| {
            b.iter(|| builders.build_entity(black_box(&table)).unwrap());
        });
    }

    group.finish();
}

fn owner_change(owners: usize) -> (EntityRecord, ChangeDescription) {
    let refs: Vec<EntityReference> = (0..owners)
        .map(|i| EntityReference::new(Uuid::new_v4(), USER).with_name(format!("user{}", i)))
        .collect();
    let change = ChangeDescription::new(0.1)
        .with_added(FieldChange::added(FIELD_OWNERS, json!(refs)))
        .with_updated(FieldChange::updated(FIELD_DISPLAY_NAME, json!("Orders"), json!("Online orders")));
    let table = EntityRecord::new(TABLE, "orders", "warehouse.sales.public.orders")
        .with_version(0.2)
        .with_owners(refs)
        .with_change_description(change.clone());
    (table, change)
}

fn bench_diff_interpretation(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_interpretation");

    for owners in [1, 10, 100].iter() {
        let (table, change) = owner_change(*owners);
        group.bench_with_input(BenchmarkId::new("inherited_fields", owners), owners, |b, _| {
            b.iter(|| inherited_field_changes(black_box(&change), &table).unwrap());
        });
    }

    let (table, _) = owner_change(5);
    group.bench_function("plan_document_write", |b| {
        b.iter(|| plan_document_write(black_box(&table)).unwrap());
    });

    group.finish();
}

fn bench_cascade_planning(c: &mut Criterion) {
    let registry = IndexMappingRegistry::load(&SearchConfig::default()).unwrap();
    let (table, change) = owner_change(5);
    let mapping = registry.require(TABLE).unwrap();

    c.bench_function("plan_update_cascades", |b| {
        b.iter(|| {
            let ctx = CascadeContext::new(&registry, mapping, &table, Some(&change));
            plan_update_cascades(black_box(&ctx)).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_document_build,
    bench_diff_interpretation,
    bench_cascade_planning
);
criterion_main!(benches);
