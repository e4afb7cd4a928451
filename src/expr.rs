//! Plan expressions.
//!
//! Comparison expressions form predicate trees (`AND`/`OR`/`NOT` over
//! comparison leaves plus the `all_true`/`all_false` sentinels); scalar,
//! aggregate, sort, and update expressions parameterize the group, sort,
//! and update operators. A [`Key`] names a column, optionally pinned to the
//! left or right side of a join.

use serde::{Deserialize, Serialize};

use crate::error::ShaleError;
use crate::plan::params::ParamId;
use crate::types::Value;

// ── Keys ───────────────────────────────────────────────────────────────────

/// Which side of a two-child operator a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum KeySide {
    #[default]
    Undefined = 0,
    Left = 1,
    Right = 2,
}

impl KeySide {
    pub fn from_u8(v: u8) -> Option<KeySide> {
        match v {
            0 => Some(KeySide::Undefined),
            1 => Some(KeySide::Left),
            2 => Some(KeySide::Right),
            _ => None,
        }
    }
}

/// A column reference: string name, positional index, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum KeyValue {
    #[default]
    Null,
    String(String),
    Int(i64),
    UInt(u64),
}

/// A column key with an optional join side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Key {
    pub value: KeyValue,
    pub side: KeySide,
}

impl Key {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            value: KeyValue::String(name.into()),
            side: KeySide::Undefined,
        }
    }

    pub fn sided(name: impl Into<String>, side: KeySide) -> Self {
        Self {
            value: KeyValue::String(name.into()),
            side,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, KeyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            KeyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            KeyValue::Null => write!(f, "<null>"),
            KeyValue::String(s) => write!(f, "{s}"),
            KeyValue::Int(i) => write!(f, "#{i}"),
            KeyValue::UInt(u) => write!(f, "#{u}"),
        }
    }
}

// ── Comparison ─────────────────────────────────────────────────────────────

/// A plain comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Regex,
}

impl CompareOp {
    /// Evaluate against two values. Null operands never match; regex
    /// matches a string lhs against the rhs pattern.
    pub fn eval(&self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::*;
        if let CompareOp::Regex = self {
            let (Some(text), Some(pattern)) =
                (lhs.unwrap_union().as_str(), rhs.unwrap_union().as_str())
            else {
                return false;
            };
            return regex_lite::Regex::new(pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false);
        }
        let Some(ord) = lhs.compare(rhs) else {
            return false;
        };
        match self {
            CompareOp::Eq => ord == Equal,
            CompareOp::Ne => ord != Equal,
            CompareOp::Lt => ord == Less,
            CompareOp::Lte => ord != Greater,
            CompareOp::Gt => ord == Greater,
            CompareOp::Gte => ord != Less,
            CompareOp::Regex => unreachable!(),
        }
    }
}

/// Node kind of a comparison expression, wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareKind {
    Invalid = 0,
    Eq = 1,
    Ne = 2,
    Lt = 3,
    Lte = 4,
    Gt = 5,
    Gte = 6,
    Regex = 7,
    AllTrue = 8,
    AllFalse = 9,
    And = 10,
    Or = 11,
    Not = 12,
}

impl CompareKind {
    pub fn from_u8(v: u8) -> Option<CompareKind> {
        use CompareKind::*;
        Some(match v {
            0 => Invalid,
            1 => Eq,
            2 => Ne,
            3 => Lt,
            4 => Lte,
            5 => Gt,
            6 => Gte,
            7 => Regex,
            8 => AllTrue,
            9 => AllFalse,
            10 => And,
            11 => Or,
            12 => Not,
            _ => return None,
        })
    }

    /// Whether this kind combines child expressions.
    pub fn is_union(&self) -> bool {
        matches!(self, CompareKind::And | CompareKind::Or | CompareKind::Not)
    }

    pub fn as_op(&self) -> Option<CompareOp> {
        Some(match self {
            CompareKind::Eq => CompareOp::Eq,
            CompareKind::Ne => CompareOp::Ne,
            CompareKind::Lt => CompareOp::Lt,
            CompareKind::Lte => CompareOp::Lte,
            CompareKind::Gt => CompareOp::Gt,
            CompareKind::Gte => CompareOp::Gte,
            CompareKind::Regex => CompareOp::Regex,
            _ => return None,
        })
    }
}

/// A comparison expression tree.
///
/// Leaves compare `left` against either a bind parameter (`param`) or a
/// second column (`right`, for joins). `And`/`Or`/`Not` nodes combine
/// `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareExpr {
    pub kind: CompareKind,
    pub left: Key,
    pub right: Key,
    pub param: ParamId,
    pub children: Vec<CompareExpr>,
}

impl CompareExpr {
    /// A leaf comparing a column against a bind parameter.
    pub fn with_param(kind: CompareKind, left: Key, param: ParamId) -> Self {
        debug_assert!(!kind.is_union());
        Self {
            kind,
            left,
            right: Key::default(),
            param,
            children: Vec::new(),
        }
    }

    /// A leaf comparing two columns (join predicates).
    pub fn with_keys(kind: CompareKind, left: Key, right: Key) -> Self {
        debug_assert!(!kind.is_union());
        Self {
            kind,
            left,
            right,
            param: ParamId(0),
            children: Vec::new(),
        }
    }

    /// An `AND`/`OR`/`NOT` node over `children`.
    pub fn union_of(kind: CompareKind, children: Vec<CompareExpr>) -> Self {
        debug_assert!(kind.is_union());
        Self {
            kind,
            left: Key::default(),
            right: Key::default(),
            param: ParamId(0),
            children,
        }
    }

    pub fn all_true() -> Self {
        Self {
            kind: CompareKind::AllTrue,
            left: Key::default(),
            right: Key::default(),
            param: ParamId(0),
            children: Vec::new(),
        }
    }

    pub fn all_false() -> Self {
        Self {
            kind: CompareKind::AllFalse,
            left: Key::default(),
            right: Key::default(),
            param: ParamId(0),
            children: Vec::new(),
        }
    }

    pub fn is_union(&self) -> bool {
        self.kind.is_union()
    }

    /// Whether any node in the tree is a `NOT`. Such predicates are never
    /// pushed into the scan.
    pub fn contains_not(&self) -> bool {
        self.kind == CompareKind::Not || self.children.iter().any(|c| c.contains_not())
    }

    /// Whether this is exactly `column = $param` over `column_name`.
    pub fn is_point_lookup(&self, column_name: &str) -> bool {
        self.kind == CompareKind::Eq && self.left.as_str() == Some(column_name) && self.right.is_null()
    }
}

// ── Scalar / aggregate / sort ──────────────────────────────────────────────

/// A scalar expression; the only supported shape is field projection
/// (`get_field`), used for group-by keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarExpr {
    /// Output alias.
    pub key: Key,
    /// Source field; falls back to `key` when null.
    pub field: Key,
}

impl ScalarExpr {
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_str().or_else(|| self.key.as_str())
    }
}

/// Aggregate function kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AggFunc {
    Count = 0,
    Sum = 1,
    Avg = 2,
    Min = 3,
    Max = 4,
}

impl AggFunc {
    pub fn from_u8(v: u8) -> Option<AggFunc> {
        Some(match v {
            0 => AggFunc::Count,
            1 => AggFunc::Sum,
            2 => AggFunc::Avg,
            3 => AggFunc::Min,
            4 => AggFunc::Max,
            _ => return None,
        })
    }
}

/// An aggregate over an optional argument column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggFunc,
    /// Output alias.
    pub key: Key,
    /// Argument column; `None` for `COUNT(*)`.
    pub arg: Option<Key>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SortOrder {
    Asc = 0,
    Desc = 1,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortExpr {
    pub key: Key,
    pub order: SortOrder,
}

// ── Update ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
}

/// Right-hand side of an update assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateValue {
    /// A bind parameter.
    Param(ParamId),
    /// A column from the left or right input row.
    Column(Key),
    /// Arithmetic over two operands.
    BinaryOp {
        op: ArithOp,
        left: Box<UpdateValue>,
        right: Box<UpdateValue>,
    },
}

impl UpdateValue {
    /// Evaluate against resolved operand values.
    ///
    /// `lookup` resolves columns, `param` resolves bind parameters.
    /// Integer arithmetic stays in i64 when both operands are integral;
    /// otherwise f64. Division by zero is a type error.
    pub fn evaluate(
        &self,
        lookup: &dyn Fn(&Key) -> Result<Value, ShaleError>,
        param: &dyn Fn(ParamId) -> Result<Value, ShaleError>,
    ) -> Result<Value, ShaleError> {
        match self {
            UpdateValue::Param(id) => param(*id),
            UpdateValue::Column(key) => lookup(key),
            UpdateValue::BinaryOp { op, left, right } => {
                let lhs = left.evaluate(lookup, param)?;
                let rhs = right.evaluate(lookup, param)?;
                if lhs.is_null() || rhs.is_null() {
                    return Ok(Value::Null);
                }
                if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
                    return match op {
                        ArithOp::Add => Ok(Value::BigInt(a.wrapping_add(b))),
                        ArithOp::Sub => Ok(Value::BigInt(a.wrapping_sub(b))),
                        ArithOp::Mul => Ok(Value::BigInt(a.wrapping_mul(b))),
                        ArithOp::Div => {
                            if b == 0 {
                                Err(ShaleError::Type("division by zero".into()))
                            } else {
                                Ok(Value::BigInt(a / b))
                            }
                        }
                    };
                }
                let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                    return Err(ShaleError::Type(format!(
                        "non-numeric operands for arithmetic: {lhs}, {rhs}"
                    )));
                };
                match op {
                    ArithOp::Add => Ok(Value::Double(a + b)),
                    ArithOp::Sub => Ok(Value::Double(a - b)),
                    ArithOp::Mul => Ok(Value::Double(a * b)),
                    ArithOp::Div => {
                        if b == 0.0 {
                            Err(ShaleError::Type("division by zero".into()))
                        } else {
                            Ok(Value::Double(a / b))
                        }
                    }
                }
            }
        }
    }
}

/// One `SET column = value` assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpr {
    pub column: Key,
    pub value: UpdateValue,
}

// ── Function ───────────────────────────────────────────────────────────────

/// A named function call with bound parameters. Carried through the plan IR;
/// execution is delegated to registered callables at the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<ParamId>,
}

/// Any expression that can appear in a logical plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Compare(CompareExpr),
    Aggregate(AggregateExpr),
    Scalar(ScalarExpr),
    Sort(SortExpr),
    Update(UpdateExpr),
    Function(FunctionExpr),
}
