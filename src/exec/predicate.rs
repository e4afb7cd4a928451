//! Runtime row predicates.
//!
//! A [`Predicate`] evaluates a comparison expression against one chunk (or
//! two, for joins) at given row positions. It also converts pushable
//! predicate trees into scan filters; trees containing `NOT` or
//! column-to-column comparisons stay as post-scan row checks.

use crate::error::ShaleError;
use crate::expr::{CompareExpr, CompareKind, Key, KeySide};
use crate::plan::params::ParameterStore;
use crate::table::TableFilter;
use crate::types::{LogicalType, Value};
use crate::vector::DataChunk;

/// An in-memory row check over one or two chunks.
#[derive(Debug, Clone)]
pub struct Predicate {
    expr: CompareExpr,
}

impl Predicate {
    pub fn new(expr: CompareExpr) -> Self {
        Self { expr }
    }

    pub fn always_true() -> Self {
        Self {
            expr: CompareExpr::all_true(),
        }
    }

    /// Check one row of `left` (and optionally row `j` of `right`).
    ///
    /// A key that resolves to no column reads as null, which no comparison
    /// matches.
    pub fn check(
        &self,
        left: &DataChunk,
        right: Option<&DataChunk>,
        i: usize,
        j: usize,
        params: &ParameterStore,
    ) -> Result<bool, ShaleError> {
        eval(&self.expr, left, right, i, j, params)
    }

    pub fn check_row(
        &self,
        chunk: &DataChunk,
        row: usize,
        params: &ParameterStore,
    ) -> Result<bool, ShaleError> {
        self.check(chunk, None, row, row, params)
    }
}

fn eval(
    expr: &CompareExpr,
    left: &DataChunk,
    right: Option<&DataChunk>,
    i: usize,
    j: usize,
    params: &ParameterStore,
) -> Result<bool, ShaleError> {
    match expr.kind {
        CompareKind::AllTrue => Ok(true),
        CompareKind::AllFalse => Ok(false),
        CompareKind::And => {
            for child in &expr.children {
                if !eval(child, left, right, i, j, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        CompareKind::Or => {
            for child in &expr.children {
                if eval(child, left, right, i, j, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        CompareKind::Not => {
            let child = expr.children.first().ok_or_else(|| {
                ShaleError::Internal("NOT node without a child expression".into())
            })?;
            Ok(!eval(child, left, right, i, j, params)?)
        }
        CompareKind::Invalid => Err(ShaleError::Internal(
            "invalid compare kind reached evaluation".into(),
        )),
        _ => {
            let op = expr
                .kind
                .as_op()
                .ok_or_else(|| ShaleError::Internal("leaf without an operator".into()))?;
            let lhs = resolve_key(&expr.left, left, right, i, j)?;
            let rhs = if expr.right.is_null() {
                params.get(expr.param)?.clone()
            } else {
                resolve_key(&expr.right, left, right, i, j)?
            };
            Ok(op.eval(&lhs, &rhs))
        }
    }
}

/// Resolve a key against the chunks. Side-pinned keys address their chunk;
/// undefined keys try left, then right.
fn resolve_key(
    key: &Key,
    left: &DataChunk,
    right: Option<&DataChunk>,
    i: usize,
    j: usize,
) -> Result<Value, ShaleError> {
    let Some(name) = key.as_str() else {
        return Ok(Value::Null);
    };
    match key.side {
        KeySide::Left => lookup(left, name, i),
        KeySide::Right => match right {
            Some(chunk) => lookup(chunk, name, j),
            None => Ok(Value::Null),
        },
        KeySide::Undefined => {
            if let Some(col) = left.column_index(name) {
                return left.value(col, i);
            }
            match right {
                Some(chunk) => lookup(chunk, name, j),
                None => Ok(Value::Null),
            }
        }
    }
}

fn lookup(chunk: &DataChunk, name: &str, row: usize) -> Result<Value, ShaleError> {
    match chunk.column_index(name) {
        Some(col) => chunk.value(col, row),
        None => Ok(Value::Null),
    }
}

/// Convert a predicate into a pushdown filter over `column_defs` (the full
/// schema column order).
///
/// Returns `Ok(None)` for absent or `all_true` predicates. Errors with
/// `Unsupported` when the tree cannot be pushed: it contains `NOT`, an
/// `all_false` sentinel below a union node, a column-to-column comparison,
/// or a column the schema does not carry. Callers fall back to a post-scan
/// [`Predicate`] in that case.
pub fn to_table_filter(
    expr: Option<&CompareExpr>,
    column_defs: &[(String, LogicalType)],
    params: &ParameterStore,
) -> Result<Option<TableFilter>, ShaleError> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    if expr.kind == CompareKind::AllTrue {
        return Ok(None);
    }
    if expr.contains_not() {
        return Err(ShaleError::Unsupported(
            "NOT is not pushable into a scan filter".into(),
        ));
    }
    convert(expr, column_defs, params).map(Some)
}

fn convert(
    expr: &CompareExpr,
    column_defs: &[(String, LogicalType)],
    params: &ParameterStore,
) -> Result<TableFilter, ShaleError> {
    match expr.kind {
        CompareKind::And => Ok(TableFilter::And(
            expr.children
                .iter()
                .map(|c| convert(c, column_defs, params))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        CompareKind::Or => Ok(TableFilter::Or(
            expr.children
                .iter()
                .map(|c| convert(c, column_defs, params))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        CompareKind::AllTrue | CompareKind::AllFalse | CompareKind::Not | CompareKind::Invalid => {
            Err(ShaleError::Unsupported(format!(
                "compare kind {:?} is not pushable",
                expr.kind
            )))
        }
        _ => {
            let op = expr
                .kind
                .as_op()
                .ok_or_else(|| ShaleError::Internal("leaf without an operator".into()))?;
            if !expr.right.is_null() {
                return Err(ShaleError::Unsupported(
                    "column-to-column comparison is not pushable".into(),
                ));
            }
            let name = expr
                .left
                .as_str()
                .ok_or_else(|| ShaleError::Unsupported("filter key must be a column name".into()))?;
            let column_index = column_defs
                .iter()
                .position(|(path, _)| path == name)
                .ok_or_else(|| {
                    ShaleError::Unsupported(format!("unknown filter column '{name}'"))
                })?;
            Ok(TableFilter::Constant {
                op,
                value: params.get(expr.param)?.clone(),
                column_index,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::CompareKind;
    use crate::types::TypeTag;

    fn chunk() -> DataChunk {
        let mut c = DataChunk::new(
            vec![
                LogicalType::new(TypeTag::BigInt).with_alias("age"),
                LogicalType::new(TypeTag::StringLiteral).with_alias("name"),
            ],
            8,
        );
        c.append_row(&[Value::BigInt(30), Value::String("alice".into())], 0)
            .unwrap();
        c.append_row(&[Value::BigInt(40), Value::String("bob".into())], 1)
            .unwrap();
        c
    }

    #[test]
    fn test_leaf_against_param() {
        let mut params = ParameterStore::new();
        let p = params.add(Value::BigInt(35));
        let pred = Predicate::new(CompareExpr::with_param(
            CompareKind::Gt,
            Key::name("age"),
            p,
        ));
        let c = chunk();
        assert!(!pred.check_row(&c, 0, &params).unwrap());
        assert!(pred.check_row(&c, 1, &params).unwrap());
    }

    #[test]
    fn test_not_evaluates_as_complement() {
        let mut params = ParameterStore::new();
        let p = params.add(Value::BigInt(35));
        let leaf = CompareExpr::with_param(CompareKind::Gt, Key::name("age"), p);
        let not = Predicate::new(CompareExpr::union_of(CompareKind::Not, vec![leaf]));
        let c = chunk();
        assert!(not.check_row(&c, 0, &params).unwrap());
        assert!(!not.check_row(&c, 1, &params).unwrap());
    }

    #[test]
    fn test_join_key_resolution_by_side() {
        let params = ParameterStore::new();
        let pred = Predicate::new(CompareExpr::with_keys(
            CompareKind::Eq,
            Key::sided("age", KeySide::Left),
            Key::sided("age", KeySide::Right),
        ));
        let left = chunk();
        let right = chunk();
        assert!(pred.check(&left, Some(&right), 0, 0, &params).unwrap());
        assert!(!pred.check(&left, Some(&right), 0, 1, &params).unwrap());
    }

    #[test]
    fn test_missing_column_reads_null() {
        let params = ParameterStore::new();
        let pred = Predicate::new(CompareExpr::with_keys(
            CompareKind::Eq,
            Key::name("ghost"),
            Key::name("ghost"),
        ));
        let c = chunk();
        assert!(!pred.check_row(&c, 0, &params).unwrap());
    }

    #[test]
    fn test_pushdown_conversion() {
        let defs = vec![
            ("age".to_string(), LogicalType::new(TypeTag::BigInt)),
            ("name".to_string(), LogicalType::new(TypeTag::StringLiteral)),
        ];
        let mut params = ParameterStore::new();
        let p = params.add(Value::BigInt(10));
        let expr = CompareExpr::union_of(
            CompareKind::And,
            vec![CompareExpr::with_param(
                CompareKind::Gte,
                Key::name("age"),
                p,
            )],
        );
        let filter = to_table_filter(Some(&expr), &defs, &params)
            .unwrap()
            .unwrap();
        match filter {
            TableFilter::And(children) => match &children[0] {
                TableFilter::Constant {
                    column_index,
                    value,
                    ..
                } => {
                    assert_eq!(*column_index, 0);
                    assert_eq!(value, &Value::BigInt(10));
                }
                other => panic!("unexpected child {other:?}"),
            },
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn test_pushdown_refuses_not() {
        let defs = vec![("age".to_string(), LogicalType::new(TypeTag::BigInt))];
        let mut params = ParameterStore::new();
        let p = params.add(Value::BigInt(10));
        let leaf = CompareExpr::with_param(CompareKind::Eq, Key::name("age"), p);
        let not = CompareExpr::union_of(CompareKind::Not, vec![leaf]);
        assert!(matches!(
            to_table_filter(Some(&not), &defs, &params),
            Err(ShaleError::Unsupported(_))
        ));
    }

    #[test]
    fn test_pushdown_all_true_is_no_filter() {
        let defs = vec![];
        let params = ParameterStore::new();
        assert!(
            to_table_filter(Some(&CompareExpr::all_true()), &defs, &params)
                .unwrap()
                .is_none()
        );
        assert!(to_table_filter(None, &defs, &params).unwrap().is_none());
    }
}
