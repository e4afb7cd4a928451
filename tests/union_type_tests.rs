//! Union promotion: conflicting field types widen a column to a tagged
//! union while the physical backing type stays at the first-seen type.

mod common;

use common::*;
use serde_json::json;
use shale::types::{TypeTag, Value};

fn hex_id(i: u32) -> String {
    format!("507f1f77bcf86cd7994{i:05}")
}

#[test]
fn test_conflict_creates_union() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_basic");

    insert_docs(&engine, &coll, vec![doc(json!({ "_id": hex_id(1), "age": 30 }))]);

    {
        let catalog = engine.catalog().read().unwrap();
        let table = catalog.get_table(&coll).unwrap();
        let entry = table.read().unwrap();
        let col = entry.table.schema().column_info("age").unwrap();
        assert_eq!(col.ty.tag(), TypeTag::BigInt);
        assert!(!col.is_union);
    }

    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(2), "age": "thirty" }))],
    );

    let catalog = engine.catalog().read().unwrap();
    let table = catalog.get_table(&coll).unwrap();
    let entry = table.read().unwrap();
    let col = entry.table.schema().column_info("age").unwrap();
    // The backing type stays at the first type; the column is flagged.
    assert_eq!(col.ty.tag(), TypeTag::BigInt);
    assert!(col.is_union);
    assert_eq!(col.union_types.len(), 2);
    assert_eq!(col.union_types[0].tag(), TypeTag::BigInt);
    assert_eq!(col.union_types[1].tag(), TypeTag::StringLiteral);
}

#[test]
fn test_union_extends_with_third_type_and_tags() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_tags");

    insert_docs(&engine, &coll, vec![doc(json!({ "_id": hex_id(1), "age": 30 }))]);
    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(2), "age": "thirty" }))],
    );
    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(3), "age": true }))],
    );

    let catalog = engine.catalog().read().unwrap();
    let table = catalog.get_table(&coll).unwrap();
    let entry = table.read().unwrap();
    let schema = entry.table.schema();
    let col = schema.column_info("age").unwrap();
    assert!(col.is_union);
    assert_eq!(col.union_types.len(), 3);
    assert_eq!(col.union_types[2].tag(), TypeTag::Boolean);

    let bigint = shale::LogicalType::new(TypeTag::BigInt);
    let text = shale::LogicalType::new(TypeTag::StringLiteral);
    let boolean = shale::LogicalType::new(TypeTag::Boolean);
    assert_eq!(schema.get_union_tag("age", &bigint).unwrap(), 0);
    assert_eq!(schema.get_union_tag("age", &text).unwrap(), 1);
    assert_eq!(schema.get_union_tag("age", &boolean).unwrap(), 2);
    assert!(
        schema
            .get_union_tag("age", &shale::LogicalType::new(TypeTag::Double))
            .is_err()
    );
}

#[test]
fn test_union_rows_read_back_with_their_variant() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_values");

    insert_docs(&engine, &coll, vec![doc(json!({ "v": 42 }))]);
    insert_docs(&engine, &coll, vec![doc(json!({ "v": "text" }))]);

    let cursor = select_all(&engine, &coll);
    assert_eq!(cursor.row_count(), 2);
    match output_value(&cursor, "v", 0) {
        Value::Union { tag, value } => {
            assert_eq!(tag, 0);
            assert_eq!(*value, Value::BigInt(42));
        }
        other => panic!("expected union value, got {other:?}"),
    }
    match output_value(&cursor, "v", 1) {
        Value::Union { tag, value } => {
            assert_eq!(tag, 1);
            assert_eq!(*value, Value::String("text".into()));
        }
        other => panic!("expected union value, got {other:?}"),
    }
}

#[test]
fn test_null_on_missing_in_union_column() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_nulls");

    insert_docs(&engine, &coll, vec![doc(json!({ "_id": hex_id(1), "age": 30 }))]);
    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(2), "age": "thirty" }))],
    );
    // This document never mentions "age".
    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(4), "other": "data" }))],
    );

    let cursor = select_all(&engine, &coll);
    assert_eq!(cursor.row_count(), 3);
    assert_eq!(output_value(&cursor, "age", 2), Value::Null);

    let catalog = engine.catalog().read().unwrap();
    let table = catalog.get_table(&coll).unwrap();
    let entry = table.read().unwrap();
    let col = entry.table.schema().column_info("age").unwrap();
    // The union type set is unchanged by the miss.
    assert_eq!(col.union_types.len(), 2);
}

#[test]
fn test_multiple_union_columns_track_independent_orders() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_multi");

    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(1), "a": 1, "b": "text" }))],
    );
    insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "_id": hex_id(2), "a": "one", "b": 2 }))],
    );

    let catalog = engine.catalog().read().unwrap();
    let table = catalog.get_table(&coll).unwrap();
    let entry = table.read().unwrap();
    let schema = entry.table.schema();

    let col_a = schema.column_info("a").unwrap();
    let col_b = schema.column_info("b").unwrap();
    assert!(col_a.is_union);
    assert!(col_b.is_union);
    assert_eq!(col_a.union_types[0].tag(), TypeTag::BigInt);
    assert_eq!(col_a.union_types[1].tag(), TypeTag::StringLiteral);
    assert_eq!(col_b.union_types[0].tag(), TypeTag::StringLiteral);
    assert_eq!(col_b.union_types[1].tag(), TypeTag::BigInt);
}

#[test]
fn test_promotion_keeps_column_count() {
    let engine = engine();
    let coll = create_document_table(&engine, "union_count");

    insert_docs(&engine, &coll, vec![doc(json!({ "x": 1, "y": 2 }))]);
    let before = {
        let catalog = engine.catalog().read().unwrap();
        let table = catalog.get_table(&coll).unwrap();
        let count = table.read().unwrap().table.schema().column_count();
        count
    };
    insert_docs(&engine, &coll, vec![doc(json!({ "x": "one" }))]);
    let catalog = engine.catalog().read().unwrap();
    let table = catalog.get_table(&coll).unwrap();
    assert_eq!(table.read().unwrap().table.schema().column_count(), before);
}
