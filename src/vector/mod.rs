//! Typed column vectors.
//!
//! A [`Vector`] is a typed contiguous buffer of up to `capacity` rows with a
//! validity bitmap. Three representations exist: `FLAT` (materialized),
//! `DICTIONARY` (codes into a dictionary vector of distinct values), and
//! `CONSTANT` (length 1 replicated logically). Random-access reads work on
//! all three; writes require `FLAT`.
//!
//! Variable-length payloads live in an arena owned by the vector. Union
//! vectors store a `u8` tag array plus one child vector per variant.

pub mod chunk;

pub use chunk::DataChunk;

use chrono::{DateTime, Datelike, NaiveDate};

use crate::error::ShaleError;
use crate::types::{LogicalType, PhysicalType, TypeExtension, TypeTag, Value};

/// Default capacity of vectors and data chunks.
pub const DEFAULT_CHUNK_CAPACITY: usize = 2048;

/// Days between 0001-01-01 (CE day 1) and the 1970-01-01 epoch.
const EPOCH_CE_DAYS: i32 = 719_163;

/// Representation of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Flat,
    Dictionary,
    Constant,
}

// ── Validity ───────────────────────────────────────────────────────────────

/// One bit per row; set iff the row is non-null.
#[derive(Debug, Clone)]
pub struct Validity {
    bits: Vec<u64>,
}

impl Validity {
    /// All rows invalid.
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(64)],
        }
    }

    /// All rows valid.
    pub fn new_valid(capacity: usize) -> Self {
        Self {
            bits: vec![u64::MAX; capacity.div_ceil(64)],
        }
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.bits
            .get(row / 64)
            .is_some_and(|w| w & (1u64 << (row % 64)) != 0)
    }

    pub fn set(&mut self, row: usize, valid: bool) {
        let word = row / 64;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        if valid {
            self.bits[word] |= 1u64 << (row % 64);
        } else {
            self.bits[word] &= !(1u64 << (row % 64));
        }
    }

    pub fn count_valid(&self, rows: usize) -> usize {
        (0..rows).filter(|&i| self.is_valid(i)).count()
    }

    fn resize(&mut self, new_capacity: usize) {
        self.bits.resize(new_capacity.div_ceil(64), 0);
    }
}

// ── String arena ───────────────────────────────────────────────────────────

/// Auxiliary storage for variable-length payloads, owned by the vector.
/// Overwritten spans are not reclaimed; the arena lives and dies with the
/// vector.
#[derive(Debug, Clone, Default)]
struct StringArena {
    bytes: Vec<u8>,
    spans: Vec<(u32, u32)>,
}

impl StringArena {
    fn with_capacity(rows: usize) -> Self {
        Self {
            bytes: Vec::new(),
            spans: vec![(0, 0); rows],
        }
    }

    fn get(&self, row: usize) -> &str {
        let (off, len) = self.spans[row];
        // Spans are only written by `set`, which stores valid UTF-8.
        std::str::from_utf8(&self.bytes[off as usize..(off + len) as usize]).unwrap_or("")
    }

    fn set(&mut self, row: usize, s: &str) {
        let off = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.spans[row] = (off, s.len() as u32);
    }

    fn resize(&mut self, rows: usize) {
        self.spans.resize(rows, (0, 0));
    }
}

// ── Typed data ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum VectorData {
    /// NA columns carry only validity.
    Empty,
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    I128(Vec<i128>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    U128(Vec<u128>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Strings(StringArena),
    /// Struct/list/map cells kept as owned values.
    Nested(Vec<Value>),
    /// Tagged union: per-row variant tag plus one child vector per variant.
    Union {
        tags: Vec<u8>,
        children: Vec<Vector>,
    },
}

impl VectorData {
    fn allocate(ty: &LogicalType, capacity: usize) -> Self {
        if let Some(TypeExtension::Union { variants }) = ty.extension() {
            return VectorData::Union {
                tags: vec![0; capacity],
                children: variants
                    .iter()
                    .map(|v| Vector::new(v.clone(), capacity))
                    .collect(),
            };
        }
        match ty.physical() {
            PhysicalType::Empty => VectorData::Empty,
            PhysicalType::Bit => VectorData::Bool(vec![false; capacity]),
            PhysicalType::Int8 => VectorData::I8(vec![0; capacity]),
            PhysicalType::Int16 => VectorData::I16(vec![0; capacity]),
            PhysicalType::Int32 => VectorData::I32(vec![0; capacity]),
            PhysicalType::Int64 => VectorData::I64(vec![0; capacity]),
            PhysicalType::Int128 => VectorData::I128(vec![0; capacity]),
            PhysicalType::UInt8 => VectorData::U8(vec![0; capacity]),
            PhysicalType::UInt16 => VectorData::U16(vec![0; capacity]),
            PhysicalType::UInt32 => VectorData::U32(vec![0; capacity]),
            PhysicalType::UInt64 => VectorData::U64(vec![0; capacity]),
            PhysicalType::UInt128 => VectorData::U128(vec![0; capacity]),
            PhysicalType::Float32 => VectorData::F32(vec![0.0; capacity]),
            PhysicalType::Float64 => VectorData::F64(vec![0.0; capacity]),
            PhysicalType::VarLen => VectorData::Strings(StringArena::with_capacity(capacity)),
            PhysicalType::Nested => VectorData::Nested(vec![Value::Null; capacity]),
        }
    }

    fn resize(&mut self, new_capacity: usize) {
        match self {
            VectorData::Empty => {}
            VectorData::Bool(v) => v.resize(new_capacity, false),
            VectorData::I8(v) => v.resize(new_capacity, 0),
            VectorData::I16(v) => v.resize(new_capacity, 0),
            VectorData::I32(v) => v.resize(new_capacity, 0),
            VectorData::I64(v) => v.resize(new_capacity, 0),
            VectorData::I128(v) => v.resize(new_capacity, 0),
            VectorData::U8(v) => v.resize(new_capacity, 0),
            VectorData::U16(v) => v.resize(new_capacity, 0),
            VectorData::U32(v) => v.resize(new_capacity, 0),
            VectorData::U64(v) => v.resize(new_capacity, 0),
            VectorData::U128(v) => v.resize(new_capacity, 0),
            VectorData::F32(v) => v.resize(new_capacity, 0.0),
            VectorData::F64(v) => v.resize(new_capacity, 0.0),
            VectorData::Strings(arena) => arena.resize(new_capacity),
            VectorData::Nested(v) => v.resize(new_capacity, Value::Null),
            VectorData::Union { tags, children } => {
                tags.resize(new_capacity, 0);
                for child in children {
                    child.resize(new_capacity);
                }
            }
        }
    }
}

// ── Vector ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Repr {
    Flat {
        data: VectorData,
        validity: Validity,
        capacity: usize,
    },
    Dictionary {
        /// Per-position code into `dict`. Codes double as logical row
        /// offsets for delete/update normalization.
        codes: Vec<u32>,
        dict: Box<Vector>,
    },
    Constant {
        value: Value,
    },
}

/// A typed, validity-aware column buffer.
#[derive(Debug, Clone)]
pub struct Vector {
    ty: LogicalType,
    repr: Repr,
}

impl Vector {
    /// A flat vector of `capacity` rows, all null.
    pub fn new(ty: LogicalType, capacity: usize) -> Self {
        let data = VectorData::allocate(&ty, capacity);
        Self {
            ty,
            repr: Repr::Flat {
                data,
                validity: Validity::new(capacity),
                capacity,
            },
        }
    }

    /// A constant vector logically replicating `value`.
    pub fn constant(ty: LogicalType, value: Value) -> Self {
        Self {
            ty,
            repr: Repr::Constant { value },
        }
    }

    /// A dictionary overlay: `codes[i]` selects a row of `dict`.
    pub fn dictionary(dict: Vector, codes: Vec<u32>) -> Self {
        Self {
            ty: dict.ty.clone(),
            repr: Repr::Dictionary {
                codes,
                dict: Box::new(dict),
            },
        }
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.ty
    }

    pub fn kind(&self) -> VectorKind {
        match &self.repr {
            Repr::Flat { .. } => VectorKind::Flat,
            Repr::Dictionary { .. } => VectorKind::Dictionary,
            Repr::Constant { .. } => VectorKind::Constant,
        }
    }

    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Flat { capacity, .. } => *capacity,
            Repr::Dictionary { codes, .. } => codes.len(),
            Repr::Constant { .. } => usize::MAX,
        }
    }

    /// The logical row a dictionary position resolves to. Identity for
    /// other representations.
    pub fn logical_index(&self, row: usize) -> usize {
        match &self.repr {
            Repr::Dictionary { codes, .. } => codes[row] as usize,
            _ => row,
        }
    }

    pub fn is_valid(&self, row: usize) -> bool {
        match &self.repr {
            Repr::Flat { validity, .. } => validity.is_valid(row),
            Repr::Dictionary { codes, dict } => dict.is_valid(codes[row] as usize),
            Repr::Constant { value } => !value.is_null(),
        }
    }

    pub fn set_null(&mut self, row: usize) -> Result<(), ShaleError> {
        match &mut self.repr {
            Repr::Flat { validity, .. } => {
                validity.set(row, false);
                Ok(())
            }
            _ => Err(ShaleError::Unsupported(
                "set_null requires a FLAT vector".into(),
            )),
        }
    }

    /// Random-access read.
    pub fn value(&self, row: usize) -> Result<Value, ShaleError> {
        match &self.repr {
            Repr::Constant { value } => Ok(value.clone()),
            Repr::Dictionary { codes, dict } => {
                let code = *codes.get(row).ok_or_else(|| bounds(row, codes.len()))? as usize;
                dict.value(code)
            }
            Repr::Flat {
                data,
                validity,
                capacity,
            } => {
                if row >= *capacity {
                    return Err(bounds(row, *capacity));
                }
                if !validity.is_valid(row) {
                    return Ok(Value::Null);
                }
                Ok(self.read_flat(data, row))
            }
        }
    }

    fn read_flat(&self, data: &VectorData, row: usize) -> Value {
        match data {
            VectorData::Empty => Value::Null,
            VectorData::Bool(v) => Value::Boolean(v[row]),
            VectorData::I8(v) => Value::TinyInt(v[row]),
            VectorData::I16(v) => Value::SmallInt(v[row]),
            VectorData::I32(v) => match self.ty.tag() {
                TypeTag::Date => NaiveDate::from_num_days_from_ce_opt(v[row] + EPOCH_CE_DAYS)
                    .map(Value::Date)
                    .unwrap_or(Value::Null),
                _ => Value::Integer(v[row]),
            },
            VectorData::I64(v) => match self.ty.tag() {
                TypeTag::Timestamp => DateTime::from_timestamp_micros(v[row])
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Null),
                TypeTag::Enum => Value::Enum(v[row]),
                _ => Value::BigInt(v[row]),
            },
            VectorData::I128(v) => match self.ty.extension() {
                Some(TypeExtension::Decimal { precision, scale }) => Value::Decimal {
                    digits: v[row],
                    precision: *precision,
                    scale: *scale,
                },
                _ => match self.ty.tag() {
                    TypeTag::Interval => {
                        let packed = v[row] as u128;
                        Value::Interval {
                            months: (packed >> 96) as u32 as i32,
                            days: (packed >> 64) as u32 as i32,
                            micros: packed as u64 as i64,
                        }
                    }
                    _ => Value::HugeInt(v[row]),
                },
            },
            VectorData::U8(v) => Value::UTinyInt(v[row]),
            VectorData::U16(v) => Value::USmallInt(v[row]),
            VectorData::U32(v) => Value::UInteger(v[row]),
            VectorData::U64(v) => Value::UBigInt(v[row]),
            VectorData::U128(v) => match self.ty.tag() {
                TypeTag::Uuid => Value::Uuid(v[row].to_be_bytes()),
                _ => Value::UHugeInt(v[row]),
            },
            VectorData::F32(v) => Value::Float(v[row]),
            VectorData::F64(v) => Value::Double(v[row]),
            VectorData::Strings(arena) => Value::String(arena.get(row).to_string()),
            VectorData::Nested(v) => v[row].clone(),
            VectorData::Union { tags, children } => {
                let tag = tags[row];
                let payload = children
                    .get(tag as usize)
                    .and_then(|c| c.value(row).ok())
                    .unwrap_or(Value::Null);
                Value::Union {
                    tag,
                    value: Box::new(payload),
                }
            }
        }
    }

    /// Write `value` into a FLAT vector at `row`, updating validity.
    ///
    /// Disallowed on CONSTANT and DICTIONARY representations.
    pub fn set_value(&mut self, row: usize, value: &Value) -> Result<(), ShaleError> {
        let ty = self.ty.clone();
        let kind = self.kind();
        let Repr::Flat {
            data,
            validity,
            capacity,
        } = &mut self.repr
        else {
            return Err(ShaleError::Unsupported(format!(
                "set_value requires a FLAT vector, got {kind:?}"
            )));
        };
        if row >= *capacity {
            return Err(bounds(row, *capacity));
        }
        if value.is_null() {
            validity.set(row, false);
            return Ok(());
        }
        match data {
            VectorData::Union { tags, children } => {
                let (tag, payload) = match value {
                    Value::Union { tag, value } => (*tag, value.as_ref()),
                    // Bare values address variant 0.
                    other => (0u8, other),
                };
                let child = children.get_mut(tag as usize).ok_or_else(|| {
                    ShaleError::Type(format!("union vector has no variant {tag}"))
                })?;
                child.set_value(row, payload)?;
                tags[row] = tag;
                // Other variants stay null at this row.
            }
            _ => {
                let stored = if value.logical_type().tag() == ty.tag() {
                    value.clone()
                } else {
                    value.coerce_to(&ty)?
                };
                write_flat(data, row, &stored)?;
            }
        }
        validity.set(row, true);
        Ok(())
    }

    /// Materialize into FLAT, resolving dictionary codes and replicating
    /// constants up to `rows`.
    pub fn flatten(&mut self, rows: usize) -> Result<(), ShaleError> {
        match &self.repr {
            Repr::Flat { .. } => Ok(()),
            Repr::Dictionary { codes, dict } => {
                let mut flat = Vector::new(self.ty.clone(), codes.len().max(rows));
                for (i, &code) in codes.iter().enumerate() {
                    let v = dict.value(code as usize)?;
                    flat.set_value(i, &v)?;
                }
                *self = flat;
                Ok(())
            }
            Repr::Constant { value } => {
                let value = value.clone();
                let mut flat = Vector::new(self.ty.clone(), rows.max(1));
                for i in 0..rows {
                    flat.set_value(i, &value)?;
                }
                *self = flat;
                Ok(())
            }
        }
    }

    /// Grow a FLAT vector from `old_capacity` to `new_capacity`, preserving
    /// contents.
    pub fn resize(&mut self, new_capacity: usize) {
        if let Repr::Flat {
            data,
            validity,
            capacity,
        } = &mut self.repr
        {
            data.resize(new_capacity);
            validity.resize(new_capacity);
            *capacity = new_capacity;
        }
    }

    /// Union tag at `row` for union vectors, 0 otherwise.
    pub fn union_tag(&self, row: usize) -> u8 {
        match &self.repr {
            Repr::Flat {
                data: VectorData::Union { tags, .. },
                ..
            } => tags[row],
            _ => 0,
        }
    }
}

fn write_flat(data: &mut VectorData, row: usize, value: &Value) -> Result<(), ShaleError> {
    match (data, value) {
        (VectorData::Bool(v), Value::Boolean(b)) => v[row] = *b,
        (VectorData::I8(v), Value::TinyInt(x)) => v[row] = *x,
        (VectorData::I16(v), Value::SmallInt(x)) => v[row] = *x,
        (VectorData::I32(v), Value::Integer(x)) => v[row] = *x,
        (VectorData::I32(v), Value::Date(d)) => v[row] = d.num_days_from_ce() - EPOCH_CE_DAYS,
        (VectorData::I64(v), Value::BigInt(x)) => v[row] = *x,
        (VectorData::I64(v), Value::Timestamp(ts)) => v[row] = ts.timestamp_micros(),
        (VectorData::I64(v), Value::Enum(x)) => v[row] = *x,
        (VectorData::I128(v), Value::HugeInt(x)) => v[row] = *x,
        (VectorData::I128(v), Value::Decimal { digits, .. }) => v[row] = *digits,
        (
            VectorData::I128(v),
            Value::Interval {
                months,
                days,
                micros,
            },
        ) => {
            v[row] = (((*months as u32 as u128) << 96)
                | ((*days as u32 as u128) << 64)
                | (*micros as u64 as u128)) as i128
        }
        (VectorData::U8(v), Value::UTinyInt(x)) => v[row] = *x,
        (VectorData::U16(v), Value::USmallInt(x)) => v[row] = *x,
        (VectorData::U32(v), Value::UInteger(x)) => v[row] = *x,
        (VectorData::U64(v), Value::UBigInt(x)) => v[row] = *x,
        (VectorData::U128(v), Value::UHugeInt(x)) => v[row] = *x,
        (VectorData::U128(v), Value::Uuid(u)) => v[row] = u128::from_be_bytes(*u),
        (VectorData::F32(v), Value::Float(x)) => v[row] = *x,
        (VectorData::F64(v), Value::Double(x)) => v[row] = *x,
        (VectorData::Strings(arena), Value::String(s)) => arena.set(row, s),
        (VectorData::Nested(v), val) => v[row] = val.clone(),
        (VectorData::Empty, _) => {}
        (data, value) => {
            return Err(ShaleError::Type(format!(
                "value {value} does not fit vector layout {:?}",
                std::mem::discriminant(data)
            )));
        }
    }
    Ok(())
}

fn bounds(row: usize, capacity: usize) -> ShaleError {
    ShaleError::Bounds(format!("row {row} out of range for capacity {capacity}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_bitmap() {
        let mut validity = Validity::new(70);
        assert_eq!(validity.count_valid(70), 0);
        validity.set(0, true);
        validity.set(69, true);
        assert!(validity.is_valid(0));
        assert!(!validity.is_valid(1));
        assert!(validity.is_valid(69));
        assert_eq!(validity.count_valid(70), 2);
        validity.set(0, false);
        assert_eq!(validity.count_valid(70), 1);

        let valid = Validity::new_valid(8);
        assert_eq!(valid.count_valid(8), 8);
    }

    #[test]
    fn test_flat_write_read_with_validity() {
        let mut v = Vector::new(LogicalType::new(TypeTag::BigInt), 4);
        assert_eq!(v.value(0).unwrap(), Value::Null);
        v.set_value(0, &Value::BigInt(42)).unwrap();
        v.set_value(2, &Value::BigInt(-7)).unwrap();
        assert_eq!(v.value(0).unwrap(), Value::BigInt(42));
        assert_eq!(v.value(1).unwrap(), Value::Null);
        assert_eq!(v.value(2).unwrap(), Value::BigInt(-7));
        assert!(v.is_valid(0));
        assert!(!v.is_valid(1));
    }

    #[test]
    fn test_set_value_rejected_on_constant() {
        let mut v = Vector::constant(LogicalType::new(TypeTag::BigInt), Value::BigInt(1));
        assert!(v.set_value(0, &Value::BigInt(2)).is_err());
        assert_eq!(v.value(1000).unwrap(), Value::BigInt(1));
    }

    #[test]
    fn test_dictionary_reads_through_codes() {
        let mut dict = Vector::new(LogicalType::new(TypeTag::StringLiteral), 2);
        dict.set_value(0, &Value::String("a".into())).unwrap();
        dict.set_value(1, &Value::String("b".into())).unwrap();
        let v = Vector::dictionary(dict, vec![1, 0, 1]);
        assert_eq!(v.value(0).unwrap(), Value::String("b".into()));
        assert_eq!(v.value(1).unwrap(), Value::String("a".into()));
        assert_eq!(v.logical_index(2), 1);
        assert_eq!(v.kind(), VectorKind::Dictionary);
    }

    #[test]
    fn test_flatten_materializes() {
        let mut v = Vector::constant(LogicalType::new(TypeTag::Integer), Value::Integer(5));
        v.flatten(3).unwrap();
        assert_eq!(v.kind(), VectorKind::Flat);
        assert_eq!(v.value(2).unwrap(), Value::Integer(5));
        v.set_value(1, &Value::Integer(9)).unwrap();
        assert_eq!(v.value(1).unwrap(), Value::Integer(9));
    }

    #[test]
    fn test_resize_preserves_contents() {
        let mut v = Vector::new(LogicalType::new(TypeTag::BigInt), 2);
        v.set_value(0, &Value::BigInt(10)).unwrap();
        v.set_value(1, &Value::BigInt(20)).unwrap();
        v.resize(8);
        assert_eq!(v.capacity(), 8);
        assert_eq!(v.value(0).unwrap(), Value::BigInt(10));
        assert_eq!(v.value(1).unwrap(), Value::BigInt(20));
        assert_eq!(v.value(5).unwrap(), Value::Null);
    }

    #[test]
    fn test_string_arena_overwrite() {
        let mut v = Vector::new(LogicalType::new(TypeTag::StringLiteral), 2);
        v.set_value(0, &Value::String("short".into())).unwrap();
        v.set_value(0, &Value::String("much longer text".into()))
            .unwrap();
        assert_eq!(v.value(0).unwrap(), Value::String("much longer text".into()));
    }

    #[test]
    fn test_union_vector_tags_and_payloads() {
        let ty = LogicalType::union_type(vec![
            LogicalType::new(TypeTag::BigInt),
            LogicalType::new(TypeTag::StringLiteral),
        ]);
        let mut v = Vector::new(ty, 4);
        v.set_value(0, &Value::BigInt(30)).unwrap();
        v.set_value(
            1,
            &Value::Union {
                tag: 1,
                value: Box::new(Value::String("thirty".into())),
            },
        )
        .unwrap();

        assert_eq!(v.union_tag(0), 0);
        assert_eq!(v.union_tag(1), 1);
        match v.value(1).unwrap() {
            Value::Union { tag, value } => {
                assert_eq!(tag, 1);
                assert_eq!(*value, Value::String("thirty".into()));
            }
            other => panic!("expected union value, got {other:?}"),
        }
        // Rows never written stay null.
        assert_eq!(v.value(3).unwrap(), Value::Null);
    }

    #[test]
    fn test_union_vector_rejects_unknown_variant() {
        let ty = LogicalType::union_type(vec![LogicalType::new(TypeTag::BigInt)]);
        let mut v = Vector::new(ty, 2);
        let err = v.set_value(
            0,
            &Value::Union {
                tag: 3,
                value: Box::new(Value::BigInt(1)),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_date_roundtrip() {
        let mut v = Vector::new(LogicalType::new(TypeTag::Date), 1);
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        v.set_value(0, &Value::Date(d)).unwrap();
        assert_eq!(v.value(0).unwrap(), Value::Date(d));
    }

    #[test]
    fn test_coercing_write() {
        let mut v = Vector::new(LogicalType::new(TypeTag::BigInt), 1);
        v.set_value(0, &Value::Integer(7)).unwrap();
        assert_eq!(v.value(0).unwrap(), Value::BigInt(7));
        let mut narrow = Vector::new(LogicalType::new(TypeTag::TinyInt), 1);
        assert!(narrow.set_value(0, &Value::BigInt(1 << 20)).is_err());
    }
}
