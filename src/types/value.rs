//! Runtime values.
//!
//! A [`Value`] is the owned, dynamically-typed form a cell takes when it
//! crosses an operator boundary: random-access reads from vectors, predicate
//! evaluation, bind parameters, group keys. Columnar storage never holds
//! `Value`s for primitive types; they exist only at the edges.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};

use super::{LogicalType, TypeTag};
use crate::error::ShaleError;

/// An owned logical value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    HugeInt(i128),
    UTinyInt(u8),
    USmallInt(u16),
    UInteger(u32),
    UBigInt(u64),
    UHugeInt(u128),
    Float(f32),
    Double(f64),
    /// Unscaled digits plus precision/scale.
    Decimal {
        digits: i128,
        precision: u8,
        scale: u8,
    },
    String(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Months / days / microseconds, each independently signed.
    Interval {
        months: i32,
        days: i32,
        micros: i64,
    },
    Uuid([u8; 16]),
    /// Field values in struct-field order.
    Struct(Vec<Value>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Position in the enum's entry table.
    Enum(i64),
    /// A union cell: variant index plus payload.
    Union { tag: u8, value: Box<Value> },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The logical type this value would infer to, without aliases.
    ///
    /// Composite values infer element types from their first entry; an empty
    /// list infers `LIST[NA]`.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Value::Null => LogicalType::NA,
            Value::Boolean(_) => LogicalType::new(TypeTag::Boolean),
            Value::TinyInt(_) => LogicalType::new(TypeTag::TinyInt),
            Value::SmallInt(_) => LogicalType::new(TypeTag::SmallInt),
            Value::Integer(_) => LogicalType::new(TypeTag::Integer),
            Value::BigInt(_) => LogicalType::new(TypeTag::BigInt),
            Value::HugeInt(_) => LogicalType::new(TypeTag::HugeInt),
            Value::UTinyInt(_) => LogicalType::new(TypeTag::UTinyInt),
            Value::USmallInt(_) => LogicalType::new(TypeTag::USmallInt),
            Value::UInteger(_) => LogicalType::new(TypeTag::UInteger),
            Value::UBigInt(_) => LogicalType::new(TypeTag::UBigInt),
            Value::UHugeInt(_) => LogicalType::new(TypeTag::UHugeInt),
            Value::Float(_) => LogicalType::new(TypeTag::Float),
            Value::Double(_) => LogicalType::new(TypeTag::Double),
            Value::Decimal {
                precision, scale, ..
            } => LogicalType::decimal(*precision, *scale),
            Value::String(_) => LogicalType::new(TypeTag::StringLiteral),
            Value::Date(_) => LogicalType::new(TypeTag::Date),
            Value::Timestamp(_) => LogicalType::new(TypeTag::Timestamp),
            Value::Interval { .. } => LogicalType::new(TypeTag::Interval),
            Value::Uuid(_) => LogicalType::new(TypeTag::Uuid),
            Value::Struct(fields) => {
                LogicalType::struct_type(fields.iter().map(|f| f.logical_type()).collect())
            }
            Value::List(items) => LogicalType::list(
                items
                    .first()
                    .map(|v| v.logical_type())
                    .unwrap_or(LogicalType::NA),
            ),
            Value::Map(entries) => match entries.first() {
                Some((k, v)) => LogicalType::map(k.logical_type(), v.logical_type()),
                None => LogicalType::map(LogicalType::NA, LogicalType::NA),
            },
            Value::Enum(_) => LogicalType::enum_type(vec![]),
            Value::Union { value, .. } => LogicalType::union_type(vec![value.logical_type()]),
        }
    }

    // ── Typed accessors ──────────────────────────────────────────────────

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Widening read of any signed/unsigned integer value that fits in i64.
    /// Union cells read through to their payload.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Union { value, .. } => value.as_i64(),
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::HugeInt(v) => i64::try_from(*v).ok(),
            Value::UTinyInt(v) => Some(*v as i64),
            Value::USmallInt(v) => Some(*v as i64),
            Value::UInteger(v) => Some(*v as i64),
            Value::UBigInt(v) => i64::try_from(*v).ok(),
            Value::UHugeInt(v) => i64::try_from(*v).ok(),
            Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric read as f64; integers convert losslessly up to 2^53.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Union { value, .. } => value.as_f64(),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal { digits, scale, .. } => {
                Some(*digits as f64 / 10f64.powi(*scale as i32))
            }
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The payload of a union cell, or the value itself otherwise.
    pub fn unwrap_union(&self) -> &Value {
        match self {
            Value::Union { value, .. } => value.unwrap_union(),
            other => other,
        }
    }

    /// Coerce into `target`, erroring when the value cannot hold it.
    pub fn coerce_to(&self, target: &LogicalType) -> Result<Value, ShaleError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if self.logical_type().tag() == target.tag() {
            return Ok(self.clone());
        }
        let fail = || {
            ShaleError::Type(format!(
                "cannot coerce {self} into {target}",
            ))
        };
        match target.tag() {
            TypeTag::TinyInt => self
                .as_i64()
                .and_then(|v| i8::try_from(v).ok())
                .map(Value::TinyInt)
                .ok_or_else(fail),
            TypeTag::SmallInt => self
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Value::SmallInt)
                .ok_or_else(fail),
            TypeTag::Integer => self
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Integer)
                .ok_or_else(fail),
            TypeTag::BigInt => self.as_i64().map(Value::BigInt).ok_or_else(fail),
            TypeTag::UBigInt => self
                .as_i64()
                .and_then(|v| u64::try_from(v).ok())
                .map(Value::UBigInt)
                .ok_or_else(fail),
            TypeTag::Double => self.as_f64().map(Value::Double).ok_or_else(fail),
            TypeTag::Float => self.as_f64().map(|v| Value::Float(v as f32)).ok_or_else(fail),
            TypeTag::StringLiteral => Ok(Value::String(self.to_string())),
            _ => Err(fail()),
        }
    }

    // ── Ordering ─────────────────────────────────────────────────────────

    /// Cross-type comparison used by predicates and sorting.
    ///
    /// Numerics compare by value across tags; nulls and incomparable kinds
    /// return `None`. Union payloads compare transparently.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let lhs = self.unwrap_union();
        let rhs = other.unwrap_union();
        if lhs.is_null() || rhs.is_null() {
            return None;
        }
        match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => {
                // Numeric cross-tag comparison: exact over i64 when both
                // sides are integers, f64 otherwise.
                if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
                    return Some(a.cmp(&b));
                }
                match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                }
            }
        }
    }

    /// Total-order key for sorting: nulls first, incomparables by type tag.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or_else(|| {
                (self.logical_type().tag() as u8).cmp(&(other.logical_type().tag() as u8))
            }),
        }
    }

    /// Feed a canonical byte form into a hasher (group-by keys, DISTINCT).
    ///
    /// Floats hash by bit pattern; integers hash through i128 so equal
    /// values of different widths collide as they compare equal.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self.unwrap_union() {
            Value::Null => state.write_u8(0),
            Value::Boolean(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Float(f) => {
                state.write_u8(2);
                state.write_u64((*f as f64).to_bits());
            }
            Value::Double(f) => {
                state.write_u8(2);
                state.write_u64(f.to_bits());
            }
            Value::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Date(d) => {
                state.write_u8(4);
                d.hash(state);
            }
            Value::Timestamp(ts) => {
                state.write_u8(5);
                ts.timestamp_micros().hash(state);
            }
            Value::Uuid(u) => {
                state.write_u8(6);
                u.hash(state);
            }
            Value::Struct(fields) => {
                state.write_u8(7);
                for f in fields {
                    f.hash_into(state);
                }
            }
            Value::List(items) => {
                state.write_u8(8);
                for v in items {
                    v.hash_into(state);
                }
            }
            Value::Map(entries) => {
                state.write_u8(9);
                for (k, v) in entries {
                    k.hash_into(state);
                    v.hash_into(state);
                }
            }
            Value::Interval {
                months,
                days,
                micros,
            } => {
                state.write_u8(10);
                months.hash(state);
                days.hash(state);
                micros.hash(state);
            }
            Value::Decimal { digits, scale, .. } => {
                state.write_u8(11);
                digits.hash(state);
                scale.hash(state);
            }
            other => {
                if let Some(v) = other.as_i64() {
                    state.write_u8(12);
                    state.write_i128(v as i128);
                } else {
                    state.write_u8(13);
                }
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::HugeInt(v) => write!(f, "{v}"),
            Value::UTinyInt(v) => write!(f, "{v}"),
            Value::USmallInt(v) => write!(f, "{v}"),
            Value::UInteger(v) => write!(f, "{v}"),
            Value::UBigInt(v) => write!(f, "{v}"),
            Value::UHugeInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal { digits, scale, .. } => {
                if *scale == 0 {
                    write!(f, "{digits}")
                } else {
                    let pow = 10i128.pow(*scale as u32);
                    write!(f, "{}.{:0width$}", digits / pow, (digits % pow).abs(), width = *scale as usize)
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Interval {
                months,
                days,
                micros,
            } => write!(f, "{months}mo {days}d {micros}us"),
            Value::Uuid(u) => {
                for b in u {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, v) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Enum(v) => write!(f, "{v}"),
            Value::Union { tag, value } => write!(f, "{value}@{tag}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_width_integer_compare() {
        assert_eq!(
            Value::TinyInt(5).compare(&Value::BigInt(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Integer(-1).compare(&Value::UBigInt(0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::BigInt(10).compare(&Value::Double(9.5)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_null_compares_as_none() {
        assert_eq!(Value::Null.compare(&Value::BigInt(1)), None);
        assert_eq!(Value::BigInt(1).compare(&Value::Null), None);
    }

    #[test]
    fn test_union_payload_compares_transparently() {
        let wrapped = Value::Union {
            tag: 1,
            value: Box::new(Value::String("abc".into())),
        };
        assert_eq!(
            wrapped.compare(&Value::String("abc".into())),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::BigInt(0)), Ordering::Less);
        assert_eq!(Value::BigInt(0).sort_cmp(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.sort_cmp(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_coerce_widening_and_failure() {
        let v = Value::Integer(42);
        assert_eq!(v.coerce_to(&LogicalType::new(TypeTag::BigInt)).unwrap(), Value::BigInt(42));
        assert_eq!(
            v.coerce_to(&LogicalType::new(TypeTag::Double)).unwrap(),
            Value::Double(42.0)
        );
        let big = Value::BigInt(1 << 40);
        assert!(big.coerce_to(&LogicalType::new(TypeTag::TinyInt)).is_err());
    }

    #[test]
    fn test_hash_equal_values_collide() {
        use std::hash::DefaultHasher;
        let h = |v: &Value| {
            let mut s = DefaultHasher::new();
            v.hash_into(&mut s);
            s.finish()
        };
        assert_eq!(h(&Value::TinyInt(7)), h(&Value::BigInt(7)));
        assert_ne!(h(&Value::BigInt(7)), h(&Value::BigInt(8)));
    }

    #[test]
    fn test_decimal_display() {
        let d = Value::Decimal {
            digits: 12345,
            precision: 10,
            scale: 2,
        };
        assert_eq!(d.to_string(), "123.45");
    }
}
