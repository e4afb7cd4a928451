//! Msgpack wire format for plans, parameters, types, and chunks.
//!
//! Every entity is a msgpack array whose first element is a small tag enum
//! and whose remaining elements are typed fields in a fixed position order.
//! Enums are packed as their underlying integers. A key is `[value, side]`
//! where `value` is string | int | uint | nil. Complex logical types are
//! serialized recursively with their tag and extension.

use chrono::Datelike;
use rmpv::Value as Wire;

use crate::document::Document;
use crate::error::ShaleError;
use crate::expr::{
    AggFunc, AggregateExpr, ArithOp, CompareExpr, CompareKind, Expression, FunctionExpr, Key,
    KeySide, KeyValue, ScalarExpr, SortExpr, SortOrder, UpdateExpr, UpdateValue,
};
use crate::plan::params::{ParamId, ParameterStore};
use crate::plan::{CollectionName, DataPayload, JoinType, Limit, LogicalNode, NodeKind};
use crate::types::{LogicalType, TypeExtension, TypeTag, Value};
use crate::vector::DataChunk;

/// Tags beyond the logical-node range.
const TAG_EXPR_COMPARE: u8 = 19;
const TAG_EXPR_AGGREGATE: u8 = 20;
const TAG_EXPR_SCALAR: u8 = 21;
const TAG_EXPR_SORT: u8 = 22;
const TAG_EXPR_UPDATE: u8 = 23;
const TAG_EXPR_FUNCTION: u8 = 24;
const TAG_PARAMETERS: u8 = 25;
const TAG_COMPLEX_TYPE: u8 = 26;
const TAG_INVALID: u8 = 255;

// ── Entry points ───────────────────────────────────────────────────────────

pub fn serialize_plan(node: &LogicalNode) -> Result<Vec<u8>, ShaleError> {
    encode(node_to_wire(node)?)
}

pub fn deserialize_plan(bytes: &[u8]) -> Result<LogicalNode, ShaleError> {
    node_from_wire(&decode(bytes)?)
}

pub fn serialize_params(store: &ParameterStore) -> Result<Vec<u8>, ShaleError> {
    let entries: Vec<Wire> = store
        .iter_ordered()
        .into_iter()
        .map(|(id, value)| Wire::Array(vec![uint(id.0 as u64), value_to_wire(value)]))
        .collect();
    encode(Wire::Array(vec![uint(TAG_PARAMETERS as u64), Wire::Array(entries)]))
}

pub fn deserialize_params(bytes: &[u8]) -> Result<ParameterStore, ShaleError> {
    let wire = decode(bytes)?;
    let fields = expect_tagged(&wire, TAG_PARAMETERS, "parameters")?;
    let mut store = ParameterStore::new();
    for entry in as_array(field(fields, 0)?, "parameter entry list")? {
        let pair = as_array(entry, "parameter entry")?;
        let id = ParamId(as_u64(field(pair, 0)?, "parameter id")? as u16);
        let value = value_from_wire(field(pair, 1)?)?;
        store.bind(id, value);
    }
    Ok(store)
}

pub fn serialize_chunk(chunk: &DataChunk) -> Result<Vec<u8>, ShaleError> {
    let types: Vec<Wire> = chunk.types().iter().map(type_to_wire).collect();
    let row_ids: Vec<Wire> = chunk.row_ids().iter().map(|&id| int(id)).collect();
    let mut columns = Vec::with_capacity(chunk.column_count());
    for col in 0..chunk.column_count() {
        let mut cells = Vec::with_capacity(chunk.size());
        for row in 0..chunk.size() {
            cells.push(value_to_wire(&chunk.value(col, row)?));
        }
        columns.push(Wire::Array(cells));
    }
    encode(Wire::Array(vec![
        Wire::Array(types),
        uint(chunk.size() as u64),
        Wire::Array(row_ids),
        Wire::Array(columns),
    ]))
}

pub fn deserialize_chunk(bytes: &[u8]) -> Result<DataChunk, ShaleError> {
    let wire = decode(bytes)?;
    let fields = as_array(&wire, "chunk")?;
    let types = as_array(field(fields, 0)?, "chunk types")?
        .iter()
        .map(type_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    let cardinality = as_u64(field(fields, 1)?, "chunk cardinality")? as usize;
    let row_ids = as_array(field(fields, 2)?, "chunk row ids")?;
    let columns = as_array(field(fields, 3)?, "chunk columns")?;

    let mut chunk = DataChunk::new(types, cardinality.max(1));
    for row in 0..cardinality {
        let mut values = Vec::with_capacity(columns.len());
        for col in columns {
            let cells = as_array(col, "chunk column")?;
            values.push(value_from_wire(field(cells, row)?)?);
        }
        let row_id = as_i64(field(row_ids, row)?, "row id")?;
        chunk.append_row(&values, row_id)?;
    }
    Ok(chunk)
}

// ── Logical types ──────────────────────────────────────────────────────────

pub fn type_to_wire(ty: &LogicalType) -> Wire {
    let mut fields = vec![
        uint(TAG_COMPLEX_TYPE as u64),
        uint(ty.tag() as u64),
        match ty.alias() {
            Some(a) => Wire::from(a),
            None => Wire::Nil,
        },
    ];
    match ty.extension() {
        None => {}
        Some(TypeExtension::Decimal { precision, scale }) => {
            fields.push(uint(*precision as u64));
            fields.push(uint(*scale as u64));
        }
        Some(TypeExtension::Struct { fields: members }) => {
            fields.push(Wire::Array(members.iter().map(type_to_wire).collect()));
        }
        Some(TypeExtension::Array { element, size }) => {
            fields.push(type_to_wire(element));
            fields.push(match size {
                Some(n) => uint(*n as u64),
                None => Wire::Nil,
            });
        }
        Some(TypeExtension::Map { key, value }) => {
            fields.push(type_to_wire(key));
            fields.push(type_to_wire(value));
        }
        Some(TypeExtension::List { element }) => {
            fields.push(type_to_wire(element));
        }
        Some(TypeExtension::Enum { entries }) => {
            fields.push(Wire::Array(
                entries
                    .iter()
                    .map(|(name, v)| Wire::Array(vec![Wire::from(name.as_str()), int(*v)]))
                    .collect(),
            ));
        }
        Some(TypeExtension::Union { variants }) => {
            fields.push(Wire::Array(variants.iter().map(type_to_wire).collect()));
        }
    }
    Wire::Array(fields)
}

pub fn type_from_wire(wire: &Wire) -> Result<LogicalType, ShaleError> {
    let fields = expect_tagged(wire, TAG_COMPLEX_TYPE, "complex_logical_type")?;
    let tag = TypeTag::from_u8(as_u64(field(fields, 0)?, "type tag")? as u8)
        .ok_or_else(|| parse("unknown type tag"))?;
    let alias = match field(fields, 1)? {
        Wire::Nil => None,
        other => Some(as_str(other, "type alias")?.to_string()),
    };
    let mut ty = match tag {
        TypeTag::Decimal => LogicalType::decimal(
            as_u64(field(fields, 2)?, "decimal precision")? as u8,
            as_u64(field(fields, 3)?, "decimal scale")? as u8,
        ),
        TypeTag::Struct => LogicalType::struct_type(
            as_array(field(fields, 2)?, "struct fields")?
                .iter()
                .map(type_from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TypeTag::Array => {
            let element = type_from_wire(field(fields, 2)?)?;
            let size = match field(fields, 3)? {
                Wire::Nil => None,
                other => Some(as_u64(other, "array size")? as usize),
            };
            LogicalType::array(element, size)
        }
        TypeTag::Map => LogicalType::map(
            type_from_wire(field(fields, 2)?)?,
            type_from_wire(field(fields, 3)?)?,
        ),
        TypeTag::List => LogicalType::list(type_from_wire(field(fields, 2)?)?),
        TypeTag::Enum => {
            let entries = as_array(field(fields, 2)?, "enum entries")?
                .iter()
                .map(|e| {
                    let pair = as_array(e, "enum entry")?;
                    Ok((
                        as_str(field(pair, 0)?, "enum name")?.to_string(),
                        as_i64(field(pair, 1)?, "enum value")?,
                    ))
                })
                .collect::<Result<Vec<_>, ShaleError>>()?;
            LogicalType::enum_type(entries)
        }
        TypeTag::Union => LogicalType::union_type(
            as_array(field(fields, 2)?, "union variants")?
                .iter()
                .map(type_from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        plain => LogicalType::new(plain),
    };
    if let Some(alias) = alias {
        ty.set_alias(alias);
    }
    Ok(ty)
}

// ── Values ─────────────────────────────────────────────────────────────────

/// Values travel as `[type-tag, payload]`, recursively self-describing.
pub fn value_to_wire(value: &Value) -> Wire {
    let (tag, payload) = match value {
        Value::Null => (TypeTag::Na, Wire::Nil),
        Value::Boolean(b) => (TypeTag::Boolean, Wire::from(*b)),
        Value::TinyInt(v) => (TypeTag::TinyInt, int(*v as i64)),
        Value::SmallInt(v) => (TypeTag::SmallInt, int(*v as i64)),
        Value::Integer(v) => (TypeTag::Integer, int(*v as i64)),
        Value::BigInt(v) => (TypeTag::BigInt, int(*v)),
        Value::HugeInt(v) => (TypeTag::HugeInt, Wire::Binary(v.to_le_bytes().to_vec())),
        Value::UTinyInt(v) => (TypeTag::UTinyInt, uint(*v as u64)),
        Value::USmallInt(v) => (TypeTag::USmallInt, uint(*v as u64)),
        Value::UInteger(v) => (TypeTag::UInteger, uint(*v as u64)),
        Value::UBigInt(v) => (TypeTag::UBigInt, uint(*v)),
        Value::UHugeInt(v) => (TypeTag::UHugeInt, Wire::Binary(v.to_le_bytes().to_vec())),
        Value::Float(v) => (TypeTag::Float, Wire::F32(*v)),
        Value::Double(v) => (TypeTag::Double, Wire::F64(*v)),
        Value::Decimal {
            digits,
            precision,
            scale,
        } => (
            TypeTag::Decimal,
            Wire::Array(vec![
                Wire::Binary(digits.to_le_bytes().to_vec()),
                uint(*precision as u64),
                uint(*scale as u64),
            ]),
        ),
        Value::String(s) => (TypeTag::StringLiteral, Wire::from(s.as_str())),
        Value::Date(d) => (
            TypeTag::Date,
            int((d.num_days_from_ce() - 719_163) as i64),
        ),
        Value::Timestamp(ts) => (TypeTag::Timestamp, int(ts.timestamp_micros())),
        Value::Interval {
            months,
            days,
            micros,
        } => (
            TypeTag::Interval,
            Wire::Array(vec![int(*months as i64), int(*days as i64), int(*micros)]),
        ),
        Value::Uuid(u) => (TypeTag::Uuid, Wire::Binary(u.to_vec())),
        Value::Struct(fields) => (
            TypeTag::Struct,
            Wire::Array(fields.iter().map(value_to_wire).collect()),
        ),
        Value::List(items) => (
            TypeTag::List,
            Wire::Array(items.iter().map(value_to_wire).collect()),
        ),
        Value::Map(entries) => (
            TypeTag::Map,
            Wire::Array(
                entries
                    .iter()
                    .map(|(k, v)| Wire::Array(vec![value_to_wire(k), value_to_wire(v)]))
                    .collect(),
            ),
        ),
        Value::Enum(v) => (TypeTag::Enum, int(*v)),
        Value::Union { tag, value } => (
            TypeTag::Union,
            Wire::Array(vec![uint(*tag as u64), value_to_wire(value)]),
        ),
    };
    Wire::Array(vec![uint(tag as u64), payload])
}

pub fn value_from_wire(wire: &Wire) -> Result<Value, ShaleError> {
    let fields = as_array(wire, "value")?;
    let tag = TypeTag::from_u8(as_u64(field(fields, 0)?, "value tag")? as u8)
        .ok_or_else(|| parse("unknown value tag"))?;
    let payload = field(fields, 1)?;
    Ok(match tag {
        TypeTag::Na => Value::Null,
        TypeTag::Boolean => Value::Boolean(as_bool(payload, "boolean")?),
        TypeTag::TinyInt => Value::TinyInt(as_i64(payload, "tinyint")? as i8),
        TypeTag::SmallInt => Value::SmallInt(as_i64(payload, "smallint")? as i16),
        TypeTag::Integer => Value::Integer(as_i64(payload, "integer")? as i32),
        TypeTag::BigInt => Value::BigInt(as_i64(payload, "bigint")?),
        TypeTag::HugeInt => Value::HugeInt(i128::from_le_bytes(as_bin16(payload, "hugeint")?)),
        TypeTag::UTinyInt => Value::UTinyInt(as_u64(payload, "utinyint")? as u8),
        TypeTag::USmallInt => Value::USmallInt(as_u64(payload, "usmallint")? as u16),
        TypeTag::UInteger => Value::UInteger(as_u64(payload, "uinteger")? as u32),
        TypeTag::UBigInt => Value::UBigInt(as_u64(payload, "ubigint")?),
        TypeTag::UHugeInt => Value::UHugeInt(u128::from_le_bytes(as_bin16(payload, "uhugeint")?)),
        TypeTag::Float => Value::Float(as_f64(payload, "float")? as f32),
        TypeTag::Double => Value::Double(as_f64(payload, "double")?),
        TypeTag::Decimal => {
            let parts = as_array(payload, "decimal")?;
            Value::Decimal {
                digits: i128::from_le_bytes(as_bin16(field(parts, 0)?, "decimal digits")?),
                precision: as_u64(field(parts, 1)?, "decimal precision")? as u8,
                scale: as_u64(field(parts, 2)?, "decimal scale")? as u8,
            }
        }
        TypeTag::StringLiteral => Value::String(as_str(payload, "string")?.to_string()),
        TypeTag::Date => {
            let days = as_i64(payload, "date")? as i32;
            chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
                .map(Value::Date)
                .ok_or_else(|| parse("date out of range"))?
        }
        TypeTag::Timestamp => chrono::DateTime::from_timestamp_micros(as_i64(payload, "timestamp")?)
            .map(Value::Timestamp)
            .ok_or_else(|| parse("timestamp out of range"))?,
        TypeTag::Interval => {
            let parts = as_array(payload, "interval")?;
            Value::Interval {
                months: as_i64(field(parts, 0)?, "interval months")? as i32,
                days: as_i64(field(parts, 1)?, "interval days")? as i32,
                micros: as_i64(field(parts, 2)?, "interval micros")?,
            }
        }
        TypeTag::Uuid => {
            let bytes = as_bin16(payload, "uuid")?;
            Value::Uuid(bytes)
        }
        TypeTag::Struct => Value::Struct(
            as_array(payload, "struct")?
                .iter()
                .map(value_from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TypeTag::List | TypeTag::Array => Value::List(
            as_array(payload, "list")?
                .iter()
                .map(value_from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TypeTag::Map => Value::Map(
            as_array(payload, "map")?
                .iter()
                .map(|e| {
                    let pair = as_array(e, "map entry")?;
                    Ok((
                        value_from_wire(field(pair, 0)?)?,
                        value_from_wire(field(pair, 1)?)?,
                    ))
                })
                .collect::<Result<Vec<_>, ShaleError>>()?,
        ),
        TypeTag::Enum => Value::Enum(as_i64(payload, "enum")?),
        TypeTag::Union => {
            let parts = as_array(payload, "union")?;
            Value::Union {
                tag: as_u64(field(parts, 0)?, "union tag")? as u8,
                value: Box::new(value_from_wire(field(parts, 1)?)?),
            }
        }
    })
}

// ── Keys ───────────────────────────────────────────────────────────────────

fn key_to_wire(key: &Key) -> Wire {
    let value = match &key.value {
        KeyValue::Null => Wire::Nil,
        KeyValue::String(s) => Wire::from(s.as_str()),
        KeyValue::Int(i) => int(*i),
        KeyValue::UInt(u) => uint(*u),
    };
    Wire::Array(vec![value, uint(key.side as u64)])
}

fn key_from_wire(wire: &Wire) -> Result<Key, ShaleError> {
    let fields = as_array(wire, "key")?;
    let value = match field(fields, 0)? {
        Wire::Nil => KeyValue::Null,
        Wire::String(s) => KeyValue::String(s.as_str().unwrap_or_default().to_string()),
        // Msgpack does not distinguish uint from non-negative int, so
        // non-negative key indices normalize to the unsigned form.
        Wire::Integer(i) => match i.as_u64() {
            Some(u) => KeyValue::UInt(u),
            None => KeyValue::Int(i.as_i64().unwrap_or(0)),
        },
        _ => return Err(parse("key value must be string | int | uint | nil")),
    };
    let side = KeySide::from_u8(as_u64(field(fields, 1)?, "key side")? as u8)
        .ok_or_else(|| parse("unknown key side"))?;
    Ok(Key { value, side })
}

// ── Expressions ────────────────────────────────────────────────────────────

pub fn expression_to_wire(expr: &Expression) -> Wire {
    match expr {
        Expression::Compare(c) => compare_to_wire(c),
        Expression::Aggregate(a) => Wire::Array(vec![
            uint(TAG_EXPR_AGGREGATE as u64),
            uint(a.func as u64),
            key_to_wire(&a.key),
            match &a.arg {
                Some(k) => key_to_wire(k),
                None => Wire::Nil,
            },
        ]),
        Expression::Scalar(s) => Wire::Array(vec![
            uint(TAG_EXPR_SCALAR as u64),
            key_to_wire(&s.key),
            key_to_wire(&s.field),
        ]),
        Expression::Sort(s) => Wire::Array(vec![
            uint(TAG_EXPR_SORT as u64),
            key_to_wire(&s.key),
            uint(s.order as u64),
        ]),
        Expression::Update(u) => Wire::Array(vec![
            uint(TAG_EXPR_UPDATE as u64),
            key_to_wire(&u.column),
            update_value_to_wire(&u.value),
        ]),
        Expression::Function(f) => function_to_wire(f),
    }
}

pub fn expression_from_wire(wire: &Wire) -> Result<Expression, ShaleError> {
    let fields = as_array(wire, "expression")?;
    let tag = as_u64(field(fields, 0)?, "expression tag")? as u8;
    let rest = &fields[1..];
    Ok(match tag {
        TAG_EXPR_COMPARE => Expression::Compare(compare_from_fields(rest)?),
        TAG_EXPR_AGGREGATE => Expression::Aggregate(AggregateExpr {
            func: AggFunc::from_u8(as_u64(field(rest, 0)?, "aggregate func")? as u8)
                .ok_or_else(|| parse("unknown aggregate function"))?,
            key: key_from_wire(field(rest, 1)?)?,
            arg: match field(rest, 2)? {
                Wire::Nil => None,
                other => Some(key_from_wire(other)?),
            },
        }),
        TAG_EXPR_SCALAR => Expression::Scalar(ScalarExpr {
            key: key_from_wire(field(rest, 0)?)?,
            field: key_from_wire(field(rest, 1)?)?,
        }),
        TAG_EXPR_SORT => Expression::Sort(SortExpr {
            key: key_from_wire(field(rest, 0)?)?,
            order: match as_u64(field(rest, 1)?, "sort order")? {
                0 => SortOrder::Asc,
                1 => SortOrder::Desc,
                _ => return Err(parse("unknown sort order")),
            },
        }),
        TAG_EXPR_UPDATE => Expression::Update(UpdateExpr {
            column: key_from_wire(field(rest, 0)?)?,
            value: update_value_from_wire(field(rest, 1)?)?,
        }),
        TAG_EXPR_FUNCTION => Expression::Function(function_from_fields(rest)?),
        other => return Err(parse(&format!("unknown expression tag {other}"))),
    })
}

fn compare_to_wire(expr: &CompareExpr) -> Wire {
    Wire::Array(vec![
        uint(TAG_EXPR_COMPARE as u64),
        uint(expr.kind as u64),
        key_to_wire(&expr.left),
        key_to_wire(&expr.right),
        uint(expr.param.0 as u64),
        Wire::Array(expr.children.iter().map(compare_to_wire).collect()),
    ])
}

fn compare_from_wire(wire: &Wire) -> Result<CompareExpr, ShaleError> {
    let fields = as_array(wire, "compare expression")?;
    let tag = as_u64(field(fields, 0)?, "compare tag")? as u8;
    if tag != TAG_EXPR_COMPARE {
        return Err(parse("expected a compare expression"));
    }
    compare_from_fields(&fields[1..])
}

fn compare_from_fields(fields: &[Wire]) -> Result<CompareExpr, ShaleError> {
    let kind = CompareKind::from_u8(as_u64(field(fields, 0)?, "compare kind")? as u8)
        .ok_or_else(|| parse("unknown compare kind"))?;
    let left = key_from_wire(field(fields, 1)?)?;
    let right = key_from_wire(field(fields, 2)?)?;
    let param = ParamId(as_u64(field(fields, 3)?, "compare param")? as u16);
    let children = as_array(field(fields, 4)?, "compare children")?
        .iter()
        .map(compare_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompareExpr {
        kind,
        left,
        right,
        param,
        children,
    })
}

fn update_value_to_wire(value: &UpdateValue) -> Wire {
    match value {
        UpdateValue::Param(id) => Wire::Array(vec![uint(0), uint(id.0 as u64)]),
        UpdateValue::Column(key) => Wire::Array(vec![uint(1), key_to_wire(key)]),
        UpdateValue::BinaryOp { op, left, right } => Wire::Array(vec![
            uint(2),
            uint(*op as u64),
            update_value_to_wire(left),
            update_value_to_wire(right),
        ]),
    }
}

fn update_value_from_wire(wire: &Wire) -> Result<UpdateValue, ShaleError> {
    let fields = as_array(wire, "update value")?;
    Ok(match as_u64(field(fields, 0)?, "update value tag")? {
        0 => UpdateValue::Param(ParamId(as_u64(field(fields, 1)?, "update param")? as u16)),
        1 => UpdateValue::Column(key_from_wire(field(fields, 1)?)?),
        2 => UpdateValue::BinaryOp {
            op: match as_u64(field(fields, 1)?, "arith op")? {
                0 => ArithOp::Add,
                1 => ArithOp::Sub,
                2 => ArithOp::Mul,
                3 => ArithOp::Div,
                _ => return Err(parse("unknown arithmetic op")),
            },
            left: Box::new(update_value_from_wire(field(fields, 2)?)?),
            right: Box::new(update_value_from_wire(field(fields, 3)?)?),
        },
        other => return Err(parse(&format!("unknown update value tag {other}"))),
    })
}

fn function_to_wire(f: &FunctionExpr) -> Wire {
    Wire::Array(vec![
        uint(TAG_EXPR_FUNCTION as u64),
        Wire::from(f.name.as_str()),
        Wire::Array(f.args.iter().map(|a| uint(a.0 as u64)).collect()),
    ])
}

fn function_from_fields(fields: &[Wire]) -> Result<FunctionExpr, ShaleError> {
    Ok(FunctionExpr {
        name: as_str(field(fields, 0)?, "function name")?.to_string(),
        args: as_array(field(fields, 1)?, "function args")?
            .iter()
            .map(|a| Ok(ParamId(as_u64(a, "function arg")? as u16)))
            .collect::<Result<Vec<_>, ShaleError>>()?,
    })
}

// ── Nodes ──────────────────────────────────────────────────────────────────

fn collection_to_wire(name: &CollectionName) -> Wire {
    Wire::Array(vec![
        Wire::Array(name.namespace.iter().map(|s| Wire::from(s.as_str())).collect()),
        Wire::from(name.name.as_str()),
    ])
}

fn collection_from_wire(wire: &Wire) -> Result<CollectionName, ShaleError> {
    let fields = as_array(wire, "collection name")?;
    let namespace = as_array(field(fields, 0)?, "namespace")?
        .iter()
        .map(|s| Ok(as_str(s, "namespace segment")?.to_string()))
        .collect::<Result<Vec<_>, ShaleError>>()?;
    Ok(CollectionName {
        namespace,
        name: as_str(field(fields, 1)?, "collection")?.to_string(),
    })
}

fn optional_compare(expr: &Option<CompareExpr>) -> Wire {
    match expr {
        Some(e) => compare_to_wire(e),
        None => Wire::Nil,
    }
}

fn optional_compare_from(wire: &Wire) -> Result<Option<CompareExpr>, ShaleError> {
    match wire {
        Wire::Nil => Ok(None),
        other => Ok(Some(compare_from_wire(other)?)),
    }
}

fn children_to_wire(children: &[LogicalNode]) -> Result<Wire, ShaleError> {
    Ok(Wire::Array(
        children
            .iter()
            .map(node_to_wire)
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

fn children_from_wire(wire: &Wire) -> Result<Vec<LogicalNode>, ShaleError> {
    as_array(wire, "child nodes")?
        .iter()
        .map(node_from_wire)
        .collect()
}

pub fn node_to_wire(node: &LogicalNode) -> Result<Wire, ShaleError> {
    let tag = uint(node.kind() as u64);
    Ok(match node {
        LogicalNode::Aggregate {
            collection,
            children,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            children_to_wire(children)?,
        ]),
        LogicalNode::CreateCollection {
            collection,
            storage,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            match storage {
                Some(kind) => uint(*kind as u64),
                None => Wire::Nil,
            },
        ]),
        LogicalNode::CreateDatabase { namespace } => Wire::Array(vec![
            tag,
            Wire::Array(namespace.iter().map(|s| Wire::from(s.as_str())).collect()),
        ]),
        LogicalNode::CreateIndex { collection, name } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            Wire::from(name.as_str()),
        ]),
        LogicalNode::CreateType { ty } => Wire::Array(vec![tag, type_to_wire(ty)]),
        LogicalNode::Data { payload } => match payload {
            DataPayload::Documents(docs) => {
                let texts = docs
                    .iter()
                    .map(|d| {
                        serde_json::to_string(d.json())
                            .map(|s| Wire::from(s.as_str()))
                            .map_err(|e| ShaleError::Internal(format!("document encode: {e}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Wire::Array(vec![tag, uint(0), Wire::Array(texts)])
            }
            DataPayload::Chunk(chunk) => {
                Wire::Array(vec![tag, uint(1), Wire::Binary(serialize_chunk(chunk)?)])
            }
        },
        LogicalNode::Delete {
            collection,
            predicate,
            children,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            optional_compare(predicate),
            children_to_wire(children)?,
        ]),
        LogicalNode::DropCollection { collection } => {
            Wire::Array(vec![tag, collection_to_wire(collection)])
        }
        LogicalNode::DropDatabase { namespace } => Wire::Array(vec![
            tag,
            Wire::Array(namespace.iter().map(|s| Wire::from(s.as_str())).collect()),
        ]),
        LogicalNode::DropIndex { collection, name } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            Wire::from(name.as_str()),
        ]),
        LogicalNode::DropType { alias } => Wire::Array(vec![tag, Wire::from(alias.as_str())]),
        LogicalNode::Insert { collection, child } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            node_to_wire(child)?,
        ]),
        LogicalNode::Join {
            join_type,
            predicate,
            children,
        } => Wire::Array(vec![
            tag,
            uint(*join_type as u64),
            optional_compare(predicate),
            children_to_wire(children)?,
        ]),
        LogicalNode::Limit { limit, child } => {
            Wire::Array(vec![tag, int(limit.value()), node_to_wire(child)?])
        }
        LogicalNode::Match {
            collection,
            predicate,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            optional_compare(predicate),
        ]),
        LogicalNode::Group {
            collection,
            expressions,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            Wire::Array(expressions.iter().map(expression_to_wire).collect()),
        ]),
        LogicalNode::Sort {
            collection,
            expressions,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            Wire::Array(
                expressions
                    .iter()
                    .map(|s| expression_to_wire(&Expression::Sort(s.clone())))
                    .collect(),
            ),
        ]),
        LogicalNode::Function { function } => Wire::Array(vec![tag, function_to_wire(function)]),
        LogicalNode::Update {
            collection,
            updates,
            upsert,
            predicate,
            children,
        } => Wire::Array(vec![
            tag,
            collection_to_wire(collection),
            Wire::Array(
                updates
                    .iter()
                    .map(|u| expression_to_wire(&Expression::Update(u.clone())))
                    .collect(),
            ),
            Wire::from(*upsert),
            optional_compare(predicate),
            children_to_wire(children)?,
        ]),
    })
}

pub fn node_from_wire(wire: &Wire) -> Result<LogicalNode, ShaleError> {
    let fields = as_array(wire, "logical node")?;
    let tag = as_u64(field(fields, 0)?, "node tag")? as u8;
    if tag == TAG_INVALID {
        return Err(parse("invalid node tag 255"));
    }
    let rest = &fields[1..];
    Ok(match NodeKind::from_u8(tag) {
        NodeKind::Aggregate => LogicalNode::Aggregate {
            collection: collection_from_wire(field(rest, 0)?)?,
            children: children_from_wire(field(rest, 1)?)?,
        },
        NodeKind::CreateCollection => LogicalNode::CreateCollection {
            collection: collection_from_wire(field(rest, 0)?)?,
            storage: match field(rest, 1)? {
                Wire::Nil => None,
                other => Some(storage_from_u8(as_u64(other, "storage kind")? as u8)?),
            },
        },
        NodeKind::CreateDatabase => LogicalNode::CreateDatabase {
            namespace: namespace_from_wire(field(rest, 0)?)?,
        },
        NodeKind::CreateIndex => LogicalNode::CreateIndex {
            collection: collection_from_wire(field(rest, 0)?)?,
            name: as_str(field(rest, 1)?, "index name")?.to_string(),
        },
        NodeKind::CreateType => LogicalNode::CreateType {
            ty: type_from_wire(field(rest, 0)?)?,
        },
        NodeKind::Data => {
            let which = as_u64(field(rest, 0)?, "data payload kind")?;
            match which {
                0 => {
                    let docs = as_array(field(rest, 1)?, "documents")?
                        .iter()
                        .map(|s| Document::parse(as_str(s, "document")?))
                        .collect::<Result<Vec<_>, _>>()?;
                    LogicalNode::Data {
                        payload: DataPayload::Documents(docs),
                    }
                }
                1 => {
                    let bytes = as_binary(field(rest, 1)?, "chunk payload")?;
                    LogicalNode::Data {
                        payload: DataPayload::Chunk(deserialize_chunk(bytes)?),
                    }
                }
                other => return Err(parse(&format!("unknown data payload kind {other}"))),
            }
        }
        NodeKind::Delete => LogicalNode::Delete {
            collection: collection_from_wire(field(rest, 0)?)?,
            predicate: optional_compare_from(field(rest, 1)?)?,
            children: children_from_wire(field(rest, 2)?)?,
        },
        NodeKind::DropCollection => LogicalNode::DropCollection {
            collection: collection_from_wire(field(rest, 0)?)?,
        },
        NodeKind::DropDatabase => LogicalNode::DropDatabase {
            namespace: namespace_from_wire(field(rest, 0)?)?,
        },
        NodeKind::DropIndex => LogicalNode::DropIndex {
            collection: collection_from_wire(field(rest, 0)?)?,
            name: as_str(field(rest, 1)?, "index name")?.to_string(),
        },
        NodeKind::DropType => LogicalNode::DropType {
            alias: as_str(field(rest, 0)?, "type alias")?.to_string(),
        },
        NodeKind::Insert => LogicalNode::Insert {
            collection: collection_from_wire(field(rest, 0)?)?,
            child: Box::new(node_from_wire(field(rest, 1)?)?),
        },
        NodeKind::Join => LogicalNode::Join {
            join_type: JoinType::from_u8(as_u64(field(rest, 0)?, "join type")? as u8)
                .ok_or_else(|| parse("unknown join type"))?,
            predicate: optional_compare_from(field(rest, 1)?)?,
            children: children_from_wire(field(rest, 2)?)?,
        },
        NodeKind::Limit => LogicalNode::Limit {
            limit: Limit::new(as_i64(field(rest, 0)?, "limit")?),
            child: Box::new(node_from_wire(field(rest, 1)?)?),
        },
        NodeKind::Match => LogicalNode::Match {
            collection: collection_from_wire(field(rest, 0)?)?,
            predicate: optional_compare_from(field(rest, 1)?)?,
        },
        NodeKind::Group => LogicalNode::Group {
            collection: collection_from_wire(field(rest, 0)?)?,
            expressions: as_array(field(rest, 1)?, "group expressions")?
                .iter()
                .map(expression_from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        },
        NodeKind::Sort => {
            let exprs = as_array(field(rest, 1)?, "sort expressions")?
                .iter()
                .map(|w| match expression_from_wire(w)? {
                    Expression::Sort(s) => Ok(s),
                    _ => Err(parse("sort node carries a non-sort expression")),
                })
                .collect::<Result<Vec<_>, ShaleError>>()?;
            LogicalNode::Sort {
                collection: collection_from_wire(field(rest, 0)?)?,
                expressions: exprs,
            }
        }
        NodeKind::Function => match expression_from_wire(field(rest, 0)?)? {
            Expression::Function(function) => LogicalNode::Function { function },
            _ => return Err(parse("function node carries a non-function expression")),
        },
        NodeKind::Update => {
            let updates = as_array(field(rest, 1)?, "update expressions")?
                .iter()
                .map(|w| match expression_from_wire(w)? {
                    Expression::Update(u) => Ok(u),
                    _ => Err(parse("update node carries a non-update expression")),
                })
                .collect::<Result<Vec<_>, ShaleError>>()?;
            LogicalNode::Update {
                collection: collection_from_wire(field(rest, 0)?)?,
                updates,
                upsert: as_bool(field(rest, 2)?, "upsert flag")?,
                predicate: optional_compare_from(field(rest, 3)?)?,
                children: children_from_wire(field(rest, 4)?)?,
            }
        }
        NodeKind::Invalid => return Err(parse(&format!("unknown node tag {tag}"))),
    })
}

fn storage_from_u8(v: u8) -> Result<crate::config::StorageKind, ShaleError> {
    use crate::config::StorageKind;
    Ok(match v {
        0 => StorageKind::Documents,
        1 => StorageKind::Columns,
        2 => StorageKind::DocumentTable,
        _ => return Err(parse("unknown storage kind")),
    })
}

fn namespace_from_wire(wire: &Wire) -> Result<Vec<String>, ShaleError> {
    as_array(wire, "namespace")?
        .iter()
        .map(|s| Ok(as_str(s, "namespace segment")?.to_string()))
        .collect()
}

// ── Low-level helpers ──────────────────────────────────────────────────────

fn encode(wire: Wire) -> Result<Vec<u8>, ShaleError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &wire)
        .map_err(|e| ShaleError::Internal(format!("msgpack encode: {e}")))?;
    Ok(buf)
}

fn decode(bytes: &[u8]) -> Result<Wire, ShaleError> {
    let mut cursor = std::io::Cursor::new(bytes);
    rmpv::decode::read_value(&mut cursor).map_err(|e| parse(&format!("msgpack decode: {e}")))
}

fn parse(msg: &str) -> ShaleError {
    ShaleError::Parse(msg.to_string())
}

fn int(v: i64) -> Wire {
    Wire::from(v)
}

fn uint(v: u64) -> Wire {
    Wire::from(v)
}

fn field<'a>(fields: &'a [Wire], idx: usize) -> Result<&'a Wire, ShaleError> {
    fields
        .get(idx)
        .ok_or_else(|| parse(&format!("missing field {idx}")))
}

fn as_array<'a>(wire: &'a Wire, what: &str) -> Result<&'a [Wire], ShaleError> {
    match wire {
        Wire::Array(items) => Ok(items),
        _ => Err(parse(&format!("{what}: expected array"))),
    }
}

/// Expect `[tag, fields...]` and return the fields.
fn expect_tagged<'a>(wire: &'a Wire, tag: u8, what: &str) -> Result<&'a [Wire], ShaleError> {
    let fields = as_array(wire, what)?;
    let found = as_u64(field(fields, 0)?, "tag")? as u8;
    if found != tag {
        return Err(parse(&format!("{what}: expected tag {tag}, found {found}")));
    }
    Ok(&fields[1..])
}

fn as_u64(wire: &Wire, what: &str) -> Result<u64, ShaleError> {
    wire.as_u64()
        .ok_or_else(|| parse(&format!("{what}: expected unsigned integer")))
}

fn as_i64(wire: &Wire, what: &str) -> Result<i64, ShaleError> {
    wire.as_i64()
        .ok_or_else(|| parse(&format!("{what}: expected integer")))
}

fn as_f64(wire: &Wire, what: &str) -> Result<f64, ShaleError> {
    wire.as_f64()
        .ok_or_else(|| parse(&format!("{what}: expected float")))
}

fn as_bool(wire: &Wire, what: &str) -> Result<bool, ShaleError> {
    wire.as_bool()
        .ok_or_else(|| parse(&format!("{what}: expected bool")))
}

fn as_str<'a>(wire: &'a Wire, what: &str) -> Result<&'a str, ShaleError> {
    wire.as_str()
        .ok_or_else(|| parse(&format!("{what}: expected string")))
}

fn as_binary<'a>(wire: &'a Wire, what: &str) -> Result<&'a [u8], ShaleError> {
    match wire {
        Wire::Binary(b) => Ok(b),
        _ => Err(parse(&format!("{what}: expected binary"))),
    }
}

fn as_bin16(wire: &Wire, what: &str) -> Result<[u8; 16], ShaleError> {
    let bytes = as_binary(wire, what)?;
    bytes
        .try_into()
        .map_err(|_| parse(&format!("{what}: expected 16 bytes")))
}
