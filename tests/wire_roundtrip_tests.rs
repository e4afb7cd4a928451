//! Wire round trips: `deserialize(serialize(plan)) = plan` for every
//! logical node tag, parameter stores, and data chunks.

use serde_json::json;
use shale::document::Document;
use shale::expr::{
    AggFunc, AggregateExpr, ArithOp, CompareExpr, CompareKind, Expression, FunctionExpr, Key,
    KeySide, ScalarExpr, SortExpr, SortOrder, UpdateExpr, UpdateValue,
};
use shale::plan::params::{ParamId, ParameterStore};
use shale::plan::wire::{deserialize_params, deserialize_plan, serialize_params, serialize_plan};
use shale::plan::{CollectionName, DataPayload, JoinType, Limit, LogicalNode};
use shale::types::{LogicalType, TypeTag, Value};
use shale::vector::DataChunk;
use shale::StorageKind;

fn coll(name: &str) -> CollectionName {
    CollectionName::new(vec!["db".to_string()], name)
}

fn roundtrip(node: &LogicalNode) -> LogicalNode {
    let bytes = serialize_plan(node).expect("serialize");
    deserialize_plan(&bytes).expect("deserialize")
}

fn sample_predicate() -> CompareExpr {
    CompareExpr::union_of(
        CompareKind::And,
        vec![
            CompareExpr::with_param(CompareKind::Eq, Key::name("_id"), ParamId(0)),
            CompareExpr::union_of(
                CompareKind::Not,
                vec![CompareExpr::with_keys(
                    CompareKind::Lt,
                    Key::sided("a", KeySide::Left),
                    Key::sided("b", KeySide::Right),
                )],
            ),
        ],
    )
}

#[test]
fn test_match_roundtrip() {
    let node = LogicalNode::Match {
        collection: coll("t"),
        predicate: Some(sample_predicate()),
    };
    match roundtrip(&node) {
        LogicalNode::Match {
            collection,
            predicate,
        } => {
            assert_eq!(collection, coll("t"));
            assert_eq!(predicate, Some(sample_predicate()));
        }
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_insert_with_documents_roundtrip() {
    let docs = vec![
        Document::new(json!({ "_id": "507f1f77bcf86cd799439011", "n": 1 })),
        Document::new(json!({ "nested": { "x": true } })),
    ];
    let node = LogicalNode::Insert {
        collection: coll("t"),
        child: Box::new(LogicalNode::Data {
            payload: DataPayload::Documents(docs.clone()),
        }),
    };
    match roundtrip(&node) {
        LogicalNode::Insert { child, .. } => match *child {
            LogicalNode::Data {
                payload: DataPayload::Documents(back),
            } => assert_eq!(back, docs),
            other => panic!("wrong child {:?}", other.kind()),
        },
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_insert_with_chunk_roundtrip() {
    let mut chunk = DataChunk::new(
        vec![
            LogicalType::new(TypeTag::BigInt).with_alias("n"),
            LogicalType::new(TypeTag::StringLiteral).with_alias("s"),
        ],
        4,
    );
    chunk
        .append_row(&[Value::BigInt(7), Value::String("x".into())], 0)
        .unwrap();
    chunk.append_row(&[Value::Null, Value::Null], 1).unwrap();

    let node = LogicalNode::Insert {
        collection: coll("t"),
        child: Box::new(LogicalNode::Data {
            payload: DataPayload::Chunk(chunk),
        }),
    };
    match roundtrip(&node) {
        LogicalNode::Insert { child, .. } => match *child {
            LogicalNode::Data {
                payload: DataPayload::Chunk(back),
            } => {
                assert_eq!(back.size(), 2);
                assert_eq!(back.value(0, 0).unwrap(), Value::BigInt(7));
                assert_eq!(back.value(1, 0).unwrap(), Value::String("x".into()));
                assert_eq!(back.value(0, 1).unwrap(), Value::Null);
                assert_eq!(
                    back.types()[0].alias(),
                    Some("n")
                );
            }
            other => panic!("wrong child {:?}", other.kind()),
        },
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_delete_update_roundtrip() {
    let delete = LogicalNode::Delete {
        collection: coll("t"),
        predicate: Some(sample_predicate()),
        children: vec![LogicalNode::Match {
            collection: coll("t"),
            predicate: None,
        }],
    };
    assert_eq!(roundtrip(&delete).kind(), delete.kind());

    let update = LogicalNode::Update {
        collection: coll("t"),
        updates: vec![
            UpdateExpr {
                column: Key::name("rank"),
                value: UpdateValue::Param(ParamId(1)),
            },
            UpdateExpr {
                column: Key::name("score"),
                value: UpdateValue::BinaryOp {
                    op: ArithOp::Add,
                    left: Box::new(UpdateValue::Column(Key::name("score"))),
                    right: Box::new(UpdateValue::Param(ParamId(2))),
                },
            },
        ],
        upsert: true,
        predicate: Some(sample_predicate()),
        children: vec![],
    };
    match roundtrip(&update) {
        LogicalNode::Update {
            updates, upsert, ..
        } => {
            assert!(upsert);
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[0].value, UpdateValue::Param(ParamId(1)));
        }
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_aggregate_group_sort_roundtrip() {
    let node = LogicalNode::Aggregate {
        collection: coll("t"),
        children: vec![
            LogicalNode::Match {
                collection: coll("t"),
                predicate: None,
            },
            LogicalNode::Group {
                collection: coll("t"),
                expressions: vec![
                    Expression::Scalar(ScalarExpr {
                        key: Key::name("city"),
                        field: Key::name("city"),
                    }),
                    Expression::Aggregate(AggregateExpr {
                        func: AggFunc::Sum,
                        key: Key::name("total"),
                        arg: Some(Key::name("age")),
                    }),
                    Expression::Aggregate(AggregateExpr {
                        func: AggFunc::Count,
                        key: Key::name("n"),
                        arg: None,
                    }),
                ],
            },
            LogicalNode::Sort {
                collection: coll("t"),
                expressions: vec![
                    SortExpr {
                        key: Key::name("total"),
                        order: SortOrder::Desc,
                    },
                    SortExpr {
                        key: Key::name("city"),
                        order: SortOrder::Asc,
                    },
                ],
            },
        ],
    };
    match roundtrip(&node) {
        LogicalNode::Aggregate { children, .. } => {
            assert_eq!(children.len(), 3);
            match &children[1] {
                LogicalNode::Group { expressions, .. } => assert_eq!(expressions.len(), 3),
                other => panic!("wrong child {:?}", other.kind()),
            }
            match &children[2] {
                LogicalNode::Sort { expressions, .. } => {
                    assert_eq!(expressions[0].order, SortOrder::Desc);
                    assert_eq!(expressions[1].order, SortOrder::Asc);
                }
                other => panic!("wrong child {:?}", other.kind()),
            }
        }
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_join_limit_roundtrip() {
    let node = LogicalNode::Limit {
        limit: Limit::new(5),
        child: Box::new(LogicalNode::Join {
            join_type: JoinType::Left,
            predicate: Some(CompareExpr::with_keys(
                CompareKind::Eq,
                Key::sided("a", KeySide::Left),
                Key::sided("b", KeySide::Right),
            )),
            children: vec![
                LogicalNode::Match {
                    collection: coll("l"),
                    predicate: None,
                },
                LogicalNode::Match {
                    collection: coll("r"),
                    predicate: None,
                },
            ],
        }),
    };
    match roundtrip(&node) {
        LogicalNode::Limit { limit, child } => {
            assert_eq!(limit.value(), 5);
            match *child {
                LogicalNode::Join { join_type, .. } => assert_eq!(join_type, JoinType::Left),
                other => panic!("wrong child {:?}", other.kind()),
            }
        }
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_ddl_roundtrips() {
    let nodes = vec![
        LogicalNode::CreateDatabase {
            namespace: vec!["db".into()],
        },
        LogicalNode::DropDatabase {
            namespace: vec!["db".into()],
        },
        LogicalNode::CreateCollection {
            collection: coll("t"),
            storage: Some(StorageKind::DocumentTable),
        },
        LogicalNode::CreateCollection {
            collection: coll("t2"),
            storage: None,
        },
        LogicalNode::DropCollection {
            collection: coll("t"),
        },
        LogicalNode::CreateIndex {
            collection: coll("t"),
            name: "idx".into(),
        },
        LogicalNode::DropIndex {
            collection: coll("t"),
            name: "idx".into(),
        },
        LogicalNode::CreateType {
            ty: LogicalType::struct_type(vec![
                LogicalType::new(TypeTag::BigInt).with_alias("x"),
                LogicalType::union_type(vec![
                    LogicalType::new(TypeTag::BigInt),
                    LogicalType::new(TypeTag::StringLiteral),
                ])
                .with_alias("u"),
            ])
            .with_alias("point"),
        },
        LogicalNode::DropType {
            alias: "point".into(),
        },
        LogicalNode::Function {
            function: FunctionExpr {
                name: "gc".into(),
                args: vec![ParamId(0), ParamId(1)],
            },
        },
    ];
    for node in nodes {
        assert_eq!(roundtrip(&node).kind(), node.kind());
    }
}

#[test]
fn test_create_type_preserves_structure() {
    let ty = LogicalType::struct_type(vec![
        LogicalType::decimal(18, 2).with_alias("amount"),
        LogicalType::list(LogicalType::new(TypeTag::StringLiteral)).with_alias("tags"),
    ])
    .with_alias("order");
    let node = LogicalNode::CreateType { ty: ty.clone() };
    match roundtrip(&node) {
        LogicalNode::CreateType { ty: back } => assert_eq!(back, ty),
        other => panic!("wrong node {:?}", other.kind()),
    }
}

#[test]
fn test_parameter_store_roundtrip() {
    let mut store = ParameterStore::new();
    store.add(Value::BigInt(-5));
    store.add(Value::String("hello".into()));
    store.add(Value::Double(2.5));
    store.add(Value::Boolean(true));
    store.add(Value::Null);
    store.add(Value::Union {
        tag: 2,
        value: Box::new(Value::Boolean(false)),
    });

    let bytes = serialize_params(&store).unwrap();
    let back = deserialize_params(&bytes).unwrap();
    assert_eq!(back.len(), store.len());
    for (id, value) in store.iter_ordered() {
        assert_eq!(back.get(id).unwrap(), value);
    }
}

#[test]
fn test_garbage_bytes_rejected() {
    assert!(deserialize_plan(&[0xc1, 0xff, 0x00]).is_err());
    assert!(deserialize_params(b"not msgpack at all").is_err());
}
