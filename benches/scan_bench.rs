//! Primary-key scan vs full scan over a populated document table.

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use shale::document::Document;
use shale::expr::{CompareExpr, CompareKind, Key};
use shale::plan::params::ParameterStore;
use shale::plan::{CollectionName, DataPayload, LogicalNode};
use shale::types::Value;
use shale::{Engine, StorageKind};

const ROWS: usize = 10_000;

fn hex_id(i: u32) -> String {
    format!("507f1f77bcf86cd7994{i:05}")
}

fn populated_engine() -> (Engine, CollectionName) {
    let engine = Engine::with_defaults();
    let coll = CollectionName::new(vec!["bench".to_string()], "users");
    engine
        .create_table(&coll, StorageKind::DocumentTable)
        .expect("create table");

    let docs: Vec<Document> = (0..ROWS as u32)
        .map(|i| Document::new(json!({ "_id": hex_id(i), "name": format!("User{i}") })))
        .collect();
    let insert = LogicalNode::Insert {
        collection: coll.clone(),
        child: Box::new(LogicalNode::Data {
            payload: DataPayload::Documents(docs),
        }),
    };
    let cursor = engine.execute(&insert, &ParameterStore::new());
    assert!(!cursor.is_error());
    (engine, coll)
}

fn bench_point_lookup(c: &mut Criterion) {
    let (engine, coll) = populated_engine();

    let mut group = c.benchmark_group("point_lookup");
    group.bench_function("primary_key_scan", |b| {
        b.iter(|| {
            let mut params = ParameterStore::new();
            let p = params.add(Value::String(hex_id(ROWS as u32 / 2)));
            let node = LogicalNode::Match {
                collection: coll.clone(),
                predicate: Some(CompareExpr::with_param(
                    CompareKind::Eq,
                    Key::name("_id"),
                    p,
                )),
            };
            let cursor = engine.execute(&node, &params);
            assert_eq!(cursor.row_count(), 1);
        })
    });
    group.bench_function("full_scan", |b| {
        b.iter(|| {
            let mut params = ParameterStore::new();
            let p = params.add(Value::String(format!("User{}", ROWS / 2)));
            let node = LogicalNode::Match {
                collection: coll.clone(),
                predicate: Some(CompareExpr::with_param(
                    CompareKind::Eq,
                    Key::name("name"),
                    p,
                )),
            };
            let cursor = engine.execute(&node, &params);
            assert_eq!(cursor.row_count(), 1);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_point_lookup);
criterion_main!(benches);
