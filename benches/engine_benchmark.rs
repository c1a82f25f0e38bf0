use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use Dynadex::core::config::Config;
use Dynadex::core::types::Document;
use Dynadex::expression::{compile_condition, Condition, ExpressionContext};
use Dynadex::record::wrapper::{unwrap, wrap};
use Dynadex::schema::collection::{AccessPattern, CollectionDefinition, Normalizer};
use Dynadex::schema::layout::TableLayout;
use Dynadex::schema::registry::Registry;
use Dynadex::update::{derive_index_changes, UpdateSpec};
use Dynadex::writer::{BatchWriter, WriteDescriptor};
use rand::Rng;
use serde_json::json;

fn registry() -> Registry {
    let layout = TableLayout::new("main", "pk", "sk")
        .with_index("gsi1", "gsi1pk", Some("gsi1sk"))
        .with_index("gsi2", "gsi2pk", Some("gsi2sk"))
        .with_ttl_attribute("ttl");
    Registry::new(
        vec![CollectionDefinition::root("user", layout)
            .with_access_pattern(AccessPattern::new("gsi1", &["team"]).with_sort_key_paths(&["role", "name"]))
            .with_access_pattern(AccessPattern::new("gsi2", &["email"]).with_normalizer(Normalizer::lowercase()))
            .with_ttl_key_path("expiresAt")],
        &Config::default(),
    )
    .unwrap()
}

/// Helper to create user documents with a nested payload of `extra_fields`
fn create_user(id: usize, extra_fields: usize) -> Document {
    let mut rng = rand::thread_rng();
    let teams = ["core", "infra", "web", "data"];
    let mut profile = serde_json::Map::new();
    for i in 0..extra_fields {
        profile.insert(format!("field_{}", i), json!(rng.gen_range(0..1000)));
    }
    Document::from_value(json!({
        "_id": format!("u{:08}", id),
        "team": teams[rng.gen_range(0..teams.len())],
        "role": if id % 7 == 0 { "admin" } else { "member" },
        "name": format!("User {}", id),
        "email": format!("User{}@Example.com", id),
        "expiresAt": 1_700_000_000 + id as i64,
        "profile": profile,
    }))
    .unwrap()
}

fn bench_wrap(c: &mut Criterion) {
    let registry = registry();
    let user = registry.get("user").unwrap();
    let mut group = c.benchmark_group("wrap_document");

    for extra_fields in [0, 10, 100].iter() {
        let document = create_user(1, *extra_fields);
        group.bench_with_input(BenchmarkId::from_parameter(extra_fields), &document, |b, document| {
            b.iter(|| wrap(user, black_box(document.clone()), "|-|").unwrap());
        });
    }
    group.finish();
}

fn bench_unwrap(c: &mut Criterion) {
    let registry = registry();
    let user = registry.get("user").unwrap();
    let item = wrap(user, create_user(1, 50), "|-|").unwrap().into_item(user);

    c.bench_function("unwrap_item", |b| {
        b.iter(|| unwrap(black_box(&item)).unwrap());
    });
}

fn bench_compile_condition(c: &mut Criterion) {
    let condition = Condition::from_json(&json!({
        "$and": [
            {"age": {"$gte": 21, "$lt": 65}},
            {"$or": [{"status": "active"}, {"tags": {"$contains": "beta"}}]},
            {"profile.name": {"$beginsWith": "A"}},
            {"role": {"$in": ["admin", "owner", "member"]}},
            {"$not": {"deleted": {"$exists": true}}}
        ]
    }))
    .unwrap();

    c.bench_function("compile_condition", |b| {
        b.iter(|| {
            let mut context = ExpressionContext::new();
            compile_condition(black_box(&condition), &mut context, 100).unwrap()
        });
    });
}

fn bench_derive_update(c: &mut Criterion) {
    let registry = registry();
    let user = registry.get("user").unwrap();
    let update = UpdateSpec::new()
        .set("team", json!("web"))
        .unwrap()
        .set("role", json!("admin"))
        .unwrap()
        .set("name", json!("Ada"))
        .unwrap()
        .set("email", json!("ADA@EXAMPLE.COM"))
        .unwrap()
        .remove("expiresAt")
        .unwrap();

    c.bench_function("derive_index_changes", |b| {
        b.iter(|| derive_index_changes(user, black_box(&update), "|-|").unwrap());
    });
}

fn bench_plan_batch_write(c: &mut Criterion) {
    let registry = registry();
    let config = Config::default();
    let descriptors: Vec<WriteDescriptor> = (0..25)
        .map(|i| WriteDescriptor::Replace {
            collection: "user".to_string(),
            document: create_user(i, 5),
        })
        .collect();

    c.bench_function("plan_batch_write_25", |b| {
        b.iter(|| {
            let mut writer = BatchWriter::new(&registry, &config);
            writer.plan(black_box(descriptors.clone())).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_wrap,
    bench_unwrap,
    bench_compile_condition,
    bench_derive_update,
    bench_plan_batch_write
);
criterion_main!(benches);
