//! Operator pipeline end to end: limits, deletes, updates with upsert,
//! grouping, sorting, joins, and the post-scan NOT policy.

mod common;

use common::*;
use serde_json::json;
use shale::expr::{
    AggFunc, AggregateExpr, CompareExpr, CompareKind, Expression, Key, KeySide, ScalarExpr,
    SortExpr, SortOrder, UpdateExpr, UpdateValue,
};
use shale::plan::params::ParameterStore;
use shale::plan::{JoinType, LogicalNode};
use shale::types::Value;

fn user_docs(n: usize) -> Vec<shale::Document> {
    (1..=n)
        .map(|i| doc(json!({ "name": format!("User{i}"), "rank": i })))
        .collect()
}

// ── Limit ──────────────────────────────────────────────────────────────────

#[test]
fn test_limit_truncates_output() {
    let engine = engine();
    let coll = create_document_table(&engine, "limit_five");
    insert_docs(&engine, &coll, user_docs(10));

    let cursor = select_limit(&engine, &coll, 5);
    assert_eq!(cursor.row_count(), 5);
}

#[test]
fn test_limit_zero_returns_empty_success() {
    let engine = engine();
    let coll = create_document_table(&engine, "limit_zero");
    insert_docs(&engine, &coll, user_docs(10));

    let cursor = select_limit(&engine, &coll, 0);
    assert!(!cursor.is_error());
    assert_eq!(cursor.row_count(), 0);
}

#[test]
fn test_limit_larger_than_table() {
    let engine = engine();
    let coll = create_document_table(&engine, "limit_large");
    insert_docs(&engine, &coll, user_docs(3));

    let cursor = select_limit(&engine, &coll, 100);
    assert_eq!(cursor.row_count(), 3);
}

// ── Delete ─────────────────────────────────────────────────────────────────

#[test]
fn test_delete_without_predicate_removes_all() {
    let engine = engine();
    let coll = create_document_table(&engine, "delete_all");
    insert_docs(&engine, &coll, user_docs(3));

    let delete = LogicalNode::Delete {
        collection: coll.clone(),
        predicate: None,
        children: vec![],
    };
    let cursor = engine.execute(&delete, &ParameterStore::new());
    assert!(!cursor.is_error());
    assert_eq!(cursor.modified.len(), 3);

    assert_eq!(select_all(&engine, &coll).row_count(), 0);
}

#[test]
fn test_delete_with_predicate_is_selective() {
    let engine = engine();
    let coll = create_document_table(&engine, "delete_some");
    insert_docs(&engine, &coll, user_docs(10));

    let mut params = ParameterStore::new();
    let p = params.add(Value::BigInt(7));
    let delete = LogicalNode::Delete {
        collection: coll.clone(),
        predicate: Some(CompareExpr::with_param(CompareKind::Gt, Key::name("rank"), p)),
        children: vec![],
    };
    let cursor = engine.execute(&delete, &params);
    assert_eq!(cursor.modified.len(), 3);
    assert_eq!(select_all(&engine, &coll).row_count(), 7);
}

// ── Update ─────────────────────────────────────────────────────────────────

#[test]
fn test_update_set_constant() {
    let engine = engine();
    let coll = create_document_table(&engine, "update_const");
    insert_docs(&engine, &coll, user_docs(3));

    let mut params = ParameterStore::new();
    let target = params.add(Value::BigInt(2));
    let new_value = params.add(Value::BigInt(99));
    let update = LogicalNode::Update {
        collection: coll.clone(),
        updates: vec![UpdateExpr {
            column: Key::name("rank"),
            value: UpdateValue::Param(new_value),
        }],
        upsert: false,
        predicate: Some(CompareExpr::with_param(
            CompareKind::Eq,
            Key::name("rank"),
            target,
        )),
        children: vec![],
    };
    let cursor = engine.execute(&update, &params);
    assert_eq!(cursor.modified.len(), 1);
    assert!(cursor.no_modified.is_empty());

    let all = select_where(&engine, &coll, "rank", CompareKind::Eq, Value::BigInt(99));
    assert_eq!(all.row_count(), 1);
    assert_eq!(
        output_value(&all, "name", 0),
        Value::String("User2".into())
    );
}

#[test]
fn test_update_arithmetic_over_row_values() {
    let engine = engine();
    let coll = create_document_table(&engine, "update_arith");
    insert_docs(&engine, &coll, user_docs(3));

    // rank = rank * 10
    let mut params = ParameterStore::new();
    let factor = params.add(Value::BigInt(10));
    let update = LogicalNode::Update {
        collection: coll.clone(),
        updates: vec![UpdateExpr {
            column: Key::name("rank"),
            value: UpdateValue::BinaryOp {
                op: shale::expr::ArithOp::Mul,
                left: Box::new(UpdateValue::Column(Key::name("rank"))),
                right: Box::new(UpdateValue::Param(factor)),
            },
        }],
        upsert: false,
        predicate: None,
        children: vec![],
    };
    let cursor = engine.execute(&update, &params);
    assert_eq!(cursor.modified.len(), 3);

    let all = select_all(&engine, &coll);
    let mut ranks: Vec<i64> = (0..3)
        .map(|row| match output_value(&all, "rank", row) {
            Value::BigInt(v) => v,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![10, 20, 30]);
}

#[test]
fn test_update_reports_unchanged_rows() {
    let engine = engine();
    let coll = create_document_table(&engine, "update_nochange");
    insert_docs(&engine, &coll, vec![doc(json!({ "rank": 5 }))]);

    let mut params = ParameterStore::new();
    let same = params.add(Value::BigInt(5));
    let update = LogicalNode::Update {
        collection: coll.clone(),
        updates: vec![UpdateExpr {
            column: Key::name("rank"),
            value: UpdateValue::Param(same),
        }],
        upsert: false,
        predicate: None,
        children: vec![],
    };
    let cursor = engine.execute(&update, &params);
    assert!(cursor.modified.is_empty());
    assert_eq!(cursor.no_modified.len(), 1);
}

#[test]
fn test_upsert_appends_when_nothing_matches() {
    let engine = engine();
    let coll = create_document_table(&engine, "upsert");
    insert_docs(&engine, &coll, vec![doc(json!({ "rank": 1 }))]);

    let mut params = ParameterStore::new();
    let missing = params.add(Value::BigInt(777));
    let new_value = params.add(Value::BigInt(777));
    let update = LogicalNode::Update {
        collection: coll.clone(),
        updates: vec![UpdateExpr {
            column: Key::name("rank"),
            value: UpdateValue::Param(new_value),
        }],
        upsert: true,
        predicate: Some(CompareExpr::with_param(
            CompareKind::Eq,
            Key::name("rank"),
            missing,
        )),
        children: vec![],
    };
    let cursor = engine.execute(&update, &params);
    assert_eq!(cursor.modified.len(), 1);

    assert_eq!(select_all(&engine, &coll).row_count(), 2);
    let found = select_where(&engine, &coll, "rank", CompareKind::Eq, Value::BigInt(777));
    assert_eq!(found.row_count(), 1);
}

// ── Group / sort ───────────────────────────────────────────────────────────

fn aggregate_node(
    coll: &shale::CollectionName,
    children: Vec<LogicalNode>,
) -> LogicalNode {
    LogicalNode::Aggregate {
        collection: coll.clone(),
        children,
    }
}

#[test]
fn test_group_by_with_aggregates() {
    let engine = engine();
    let coll = create_document_table(&engine, "grouping");
    insert_docs(
        &engine,
        &coll,
        vec![
            doc(json!({ "city": "NYC", "age": 30 })),
            doc(json!({ "city": "NYC", "age": 40 })),
            doc(json!({ "city": "LA", "age": 20 })),
        ],
    );

    let group = LogicalNode::Group {
        collection: coll.clone(),
        expressions: vec![
            Expression::Scalar(ScalarExpr {
                key: Key::name("city"),
                field: Key::name("city"),
            }),
            Expression::Aggregate(AggregateExpr {
                func: AggFunc::Count,
                key: Key::name("n"),
                arg: None,
            }),
            Expression::Aggregate(AggregateExpr {
                func: AggFunc::Sum,
                key: Key::name("total_age"),
                arg: Some(Key::name("age")),
            }),
            Expression::Aggregate(AggregateExpr {
                func: AggFunc::Avg,
                key: Key::name("avg_age"),
                arg: Some(Key::name("age")),
            }),
            Expression::Aggregate(AggregateExpr {
                func: AggFunc::Max,
                key: Key::name("oldest"),
                arg: Some(Key::name("age")),
            }),
        ],
    };
    let cursor = engine.execute(
        &aggregate_node(&coll, vec![group]),
        &ParameterStore::new(),
    );
    assert!(!cursor.is_error(), "group failed: {:?}", cursor.error);
    assert_eq!(cursor.row_count(), 2);

    // Groups appear in first-seen order.
    assert_eq!(output_value(&cursor, "city", 0), Value::String("NYC".into()));
    assert_eq!(output_value(&cursor, "n", 0), Value::BigInt(2));
    assert_eq!(output_value(&cursor, "total_age", 0), Value::BigInt(70));
    assert_eq!(output_value(&cursor, "avg_age", 0), Value::Double(35.0));
    assert_eq!(output_value(&cursor, "oldest", 0), Value::BigInt(40));
    assert_eq!(output_value(&cursor, "city", 1), Value::String("LA".into()));
    assert_eq!(output_value(&cursor, "n", 1), Value::BigInt(1));
}

#[test]
fn test_count_distinct_on_named_column() {
    let engine = engine();
    let coll = create_document_table(&engine, "distinct");
    insert_docs(
        &engine,
        &coll,
        vec![
            doc(json!({ "tag": "a" })),
            doc(json!({ "tag": "a" })),
            doc(json!({ "tag": "b" })),
            doc(json!({ "other": 1 })),
        ],
    );

    let group = LogicalNode::Group {
        collection: coll.clone(),
        expressions: vec![Expression::Aggregate(AggregateExpr {
            func: AggFunc::Count,
            key: Key::name("tags"),
            arg: Some(Key::name("tag")),
        })],
    };
    let cursor = engine.execute(
        &aggregate_node(&coll, vec![group]),
        &ParameterStore::new(),
    );
    assert_eq!(cursor.row_count(), 1);
    // Distinct non-null values only.
    assert_eq!(output_value(&cursor, "tags", 0), Value::BigInt(2));
}

#[test]
fn test_sort_descending_is_stable() {
    let engine = engine();
    let coll = create_document_table(&engine, "sorting");
    insert_docs(
        &engine,
        &coll,
        vec![
            doc(json!({ "name": "a", "score": 1 })),
            doc(json!({ "name": "b", "score": 3 })),
            doc(json!({ "name": "c", "score": 3 })),
            doc(json!({ "name": "d", "score": 2 })),
        ],
    );

    let sort = LogicalNode::Sort {
        collection: coll.clone(),
        expressions: vec![SortExpr {
            key: Key::name("score"),
            order: SortOrder::Desc,
        }],
    };
    let cursor = engine.execute(&aggregate_node(&coll, vec![sort]), &ParameterStore::new());
    assert_eq!(cursor.row_count(), 4);
    let names: Vec<Value> = (0..4).map(|r| output_value(&cursor, "name", r)).collect();
    // Equal scores keep input order: b before c.
    assert_eq!(
        names,
        vec![
            Value::String("b".into()),
            Value::String("c".into()),
            Value::String("d".into()),
            Value::String("a".into()),
        ]
    );
}

// ── Join ───────────────────────────────────────────────────────────────────

#[test]
fn test_inner_join_on_key_equality() {
    let engine = engine();
    let users = create_document_table(&engine, "join_users");
    let cities = create_document_table(&engine, "join_cities");
    insert_docs(
        &engine,
        &users,
        vec![
            doc(json!({ "name": "Alice", "city_id": 1 })),
            doc(json!({ "name": "Bob", "city_id": 2 })),
            doc(json!({ "name": "Eve", "city_id": 9 })),
        ],
    );
    insert_docs(
        &engine,
        &cities,
        vec![
            doc(json!({ "id": 1, "city": "NYC" })),
            doc(json!({ "id": 2, "city": "LA" })),
        ],
    );

    let join = LogicalNode::Join {
        join_type: JoinType::Inner,
        predicate: Some(CompareExpr::with_keys(
            CompareKind::Eq,
            Key::sided("city_id", KeySide::Left),
            Key::sided("id", KeySide::Right),
        )),
        children: vec![
            LogicalNode::Match {
                collection: users.clone(),
                predicate: None,
            },
            LogicalNode::Match {
                collection: cities.clone(),
                predicate: None,
            },
        ],
    };
    let cursor = engine.execute(&join, &ParameterStore::new());
    assert!(!cursor.is_error(), "join failed: {:?}", cursor.error);
    assert_eq!(cursor.row_count(), 2);
    assert_eq!(output_value(&cursor, "name", 0), Value::String("Alice".into()));
    assert_eq!(output_value(&cursor, "city", 0), Value::String("NYC".into()));
}

#[test]
fn test_left_join_pads_unmatched_rows() {
    let engine = engine();
    let users = create_document_table(&engine, "ljoin_users");
    let cities = create_document_table(&engine, "ljoin_cities");
    insert_docs(
        &engine,
        &users,
        vec![
            doc(json!({ "name": "Alice", "city_id": 1 })),
            doc(json!({ "name": "Eve", "city_id": 9 })),
        ],
    );
    insert_docs(&engine, &cities, vec![doc(json!({ "id": 1, "city": "NYC" }))]);

    let join = LogicalNode::Join {
        join_type: JoinType::Left,
        predicate: Some(CompareExpr::with_keys(
            CompareKind::Eq,
            Key::sided("city_id", KeySide::Left),
            Key::sided("id", KeySide::Right),
        )),
        children: vec![
            LogicalNode::Match {
                collection: users.clone(),
                predicate: None,
            },
            LogicalNode::Match {
                collection: cities.clone(),
                predicate: None,
            },
        ],
    };
    let cursor = engine.execute(&join, &ParameterStore::new());
    assert_eq!(cursor.row_count(), 2);
    assert_eq!(output_value(&cursor, "name", 1), Value::String("Eve".into()));
    assert_eq!(output_value(&cursor, "city", 1), Value::Null);
}

#[test]
fn test_cross_join_cardinality() {
    let engine = engine();
    let a = create_document_table(&engine, "cross_a");
    let b = create_document_table(&engine, "cross_b");
    insert_docs(&engine, &a, vec![doc(json!({ "x": 1 })), doc(json!({ "x": 2 }))]);
    insert_docs(
        &engine,
        &b,
        vec![doc(json!({ "y": 1 })), doc(json!({ "y": 2 })), doc(json!({ "y": 3 }))],
    );

    let join = LogicalNode::Join {
        join_type: JoinType::Cross,
        predicate: None,
        children: vec![
            LogicalNode::Match {
                collection: a.clone(),
                predicate: None,
            },
            LogicalNode::Match {
                collection: b.clone(),
                predicate: None,
            },
        ],
    };
    let cursor = engine.execute(&join, &ParameterStore::new());
    assert_eq!(cursor.row_count(), 6);
}

// ── NOT stays post-scan ────────────────────────────────────────────────────

#[test]
fn test_top_level_not_matches_complement() {
    let engine = engine();
    let coll = create_document_table(&engine, "not_policy");
    insert_docs(&engine, &coll, user_docs(10));

    let mut params = ParameterStore::new();
    let p = params.add(Value::BigInt(4));
    let leaf = CompareExpr::with_param(CompareKind::Lte, Key::name("rank"), p);

    let positive = engine.execute(
        &LogicalNode::Match {
            collection: coll.clone(),
            predicate: Some(leaf.clone()),
        },
        &params,
    );
    let negated = engine.execute(
        &LogicalNode::Match {
            collection: coll.clone(),
            predicate: Some(CompareExpr::union_of(CompareKind::Not, vec![leaf])),
        },
        &params,
    );
    assert!(!negated.is_error());
    assert_eq!(positive.row_count(), 4);
    assert_eq!(negated.row_count(), 6);
    assert_eq!(positive.row_count() + negated.row_count(), 10);
}

// ── Insert output ──────────────────────────────────────────────────────────

#[test]
fn test_insert_outputs_fresh_rows_in_order() {
    let engine = engine();
    let coll = create_document_table(&engine, "insert_out");
    insert_docs(&engine, &coll, user_docs(2));

    let cursor = insert_docs(
        &engine,
        &coll,
        vec![doc(json!({ "name": "New1" })), doc(json!({ "name": "New2" }))],
    );
    assert_eq!(cursor.modified, vec![2, 3]);
    assert_eq!(cursor.row_count(), 2);
    assert_eq!(output_value(&cursor, "name", 0), Value::String("New1".into()));
    assert_eq!(output_value(&cursor, "name", 1), Value::String("New2".into()));
}

#[test]
fn test_insert_skips_invalid_documents() {
    let engine = engine();
    let coll = create_document_table(&engine, "insert_invalid");

    let cursor = insert_docs(
        &engine,
        &coll,
        vec![
            doc(json!(42)),
            doc(json!({ "ok": true })),
            doc(json!({})),
        ],
    );
    assert!(!cursor.is_error());
    assert_eq!(cursor.modified.len(), 1);
    assert_eq!(select_all(&engine, &coll).row_count(), 1);
}
