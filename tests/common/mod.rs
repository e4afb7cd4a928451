//! Shared helpers for integration tests.
#![allow(dead_code)]

use serde_json::Value as Json;
use shale::document::Document;
use shale::exec::Cursor;
use shale::expr::{CompareExpr, CompareKind, Key};
use shale::plan::params::ParameterStore;
use shale::plan::{CollectionName, DataPayload, Limit, LogicalNode};
use shale::types::Value;
use shale::{Engine, StorageKind};

pub fn engine() -> Engine {
    Engine::with_defaults()
}

pub fn collection(name: &str) -> CollectionName {
    CollectionName::new(vec!["test_db".to_string()], name)
}

/// Create `name` as a document-table collection.
pub fn create_document_table(engine: &Engine, name: &str) -> CollectionName {
    let coll = collection(name);
    engine
        .create_table(&coll, StorageKind::DocumentTable)
        .expect("create table");
    coll
}

pub fn doc(json: Json) -> Document {
    Document::new(json)
}

/// Run an INSERT of `docs` and return the cursor.
pub fn insert_docs(engine: &Engine, coll: &CollectionName, docs: Vec<Document>) -> Cursor {
    let node = LogicalNode::Insert {
        collection: coll.clone(),
        child: Box::new(LogicalNode::Data {
            payload: DataPayload::Documents(docs),
        }),
    };
    engine.execute(&node, &ParameterStore::new())
}

/// `SELECT * FROM coll` without a predicate.
pub fn select_all(engine: &Engine, coll: &CollectionName) -> Cursor {
    let node = LogicalNode::Match {
        collection: coll.clone(),
        predicate: None,
    };
    engine.execute(&node, &ParameterStore::new())
}

/// `SELECT * FROM coll LIMIT n`.
pub fn select_limit(engine: &Engine, coll: &CollectionName, n: i64) -> Cursor {
    let node = LogicalNode::Limit {
        limit: Limit::new(n),
        child: Box::new(LogicalNode::Match {
            collection: coll.clone(),
            predicate: None,
        }),
    };
    engine.execute(&node, &ParameterStore::new())
}

/// `SELECT * FROM coll WHERE column <op> value`.
pub fn select_where(
    engine: &Engine,
    coll: &CollectionName,
    column: &str,
    kind: CompareKind,
    value: Value,
) -> Cursor {
    let mut params = ParameterStore::new();
    let p = params.add(value);
    let node = LogicalNode::Match {
        collection: coll.clone(),
        predicate: Some(CompareExpr::with_param(kind, Key::name(column), p)),
    };
    engine.execute(&node, &params)
}

/// Column aliases of the cursor's output chunk.
pub fn output_columns(cursor: &Cursor) -> Vec<String> {
    cursor
        .output
        .as_ref()
        .and_then(|o| o.chunk())
        .map(|c| {
            c.types()
                .iter()
                .filter_map(|t| t.alias().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Value at `(column alias, row)` of the cursor's output chunk.
pub fn output_value(cursor: &Cursor, column: &str, row: usize) -> Value {
    let chunk = cursor
        .output
        .as_ref()
        .and_then(|o| o.chunk())
        .expect("cursor carries a chunk");
    let col = chunk
        .column_index(column)
        .unwrap_or_else(|| panic!("no column '{column}'"));
    chunk.value(col, row).expect("value in range")
}
