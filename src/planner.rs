//! Physical planning: logical nodes to operator trees.
//!
//! Dispatch is by node kind, with storage-kind routing where it matters:
//! a `match` over a document-table with a single `_id = $param` predicate
//! becomes a primary-key scan, everything else a full scan. Group, sort,
//! and join consume columnar chunks irrespective of the source storage, so
//! one implementation serves every table kind. DDL nodes are executed by
//! the engine directly and never reach the planner.

use crate::catalog::Catalog;
use crate::config::StorageKind;
use crate::document::ID_PATH;
use crate::error::ShaleError;
use crate::exec::operators::{
    DeleteOp, FullScan, GroupOp, InsertOp, JoinOp, Operator, OperatorNode, PrimaryKeyScan,
    RawData, SortOp, UpdateOp,
};
use crate::expr::Expression;
use crate::plan::{CollectionName, Limit, LogicalNode, NodeKind};

/// Planner knobs taken from the engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Rows a scan pulls per batch before re-checking cancellation.
    pub scan_batch_rows: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            scan_batch_rows: crate::vector::DEFAULT_CHUNK_CAPACITY,
        }
    }
}

/// Build the operator tree for `node` under `limit`.
pub fn plan(
    catalog: &Catalog,
    node: &LogicalNode,
    limit: Limit,
    opts: PlanOptions,
) -> Result<OperatorNode, ShaleError> {
    match node {
        LogicalNode::Match {
            collection,
            predicate,
        } => plan_match(catalog, collection, predicate.as_ref(), limit, opts),

        LogicalNode::Aggregate {
            collection,
            children,
        } => plan_aggregate(catalog, collection, children, limit, opts),

        LogicalNode::Insert { collection, child } => {
            let table = catalog.get_table(collection)?;
            let source = plan(catalog, child, Limit::unbounded(), opts)?;
            Ok(OperatorNode::new(Operator::Insert(InsertOp::new(table))).with_left(source))
        }

        LogicalNode::Delete {
            collection,
            predicate,
            children,
        } => {
            let table = catalog.get_table(collection)?;
            if children.len() == 2 {
                // Join-form delete: the predicate runs over the Cartesian
                // product inside the operator.
                let left = plan(catalog, &children[0], Limit::unbounded(), opts)?;
                let right = plan(catalog, &children[1], Limit::unbounded(), opts)?;
                Ok(
                    OperatorNode::new(Operator::Delete(DeleteOp::new(table, predicate.clone())))
                        .with_left(left)
                        .with_right(right),
                )
            } else {
                // Single-table delete: the scan pre-filters, the operator
                // deletes everything the scan produced.
                let scan =
                    plan_match(catalog, collection, predicate.as_ref(), Limit::unbounded(), opts)?;
                Ok(OperatorNode::new(Operator::Delete(DeleteOp::new(table, None)))
                    .with_left(scan))
            }
        }

        LogicalNode::Update {
            collection,
            updates,
            upsert,
            predicate,
            children,
        } => {
            let table = catalog.get_table(collection)?;
            if children.len() == 2 {
                let left = plan(catalog, &children[0], Limit::unbounded(), opts)?;
                let right = plan(catalog, &children[1], Limit::unbounded(), opts)?;
                Ok(OperatorNode::new(Operator::Update(UpdateOp::new(
                    table,
                    updates.clone(),
                    *upsert,
                    predicate.clone(),
                )))
                .with_left(left)
                .with_right(right))
            } else {
                let scan =
                    plan_match(catalog, collection, predicate.as_ref(), Limit::unbounded(), opts)?;
                Ok(OperatorNode::new(Operator::Update(UpdateOp::new(
                    table,
                    updates.clone(),
                    *upsert,
                    None,
                )))
                .with_left(scan))
            }
        }

        LogicalNode::Join {
            join_type,
            predicate,
            children,
        } => {
            if children.len() != 2 {
                return Err(ShaleError::Parse(format!(
                    "join expects two children, got {}",
                    children.len()
                )));
            }
            let left = plan(catalog, &children[0], Limit::unbounded(), opts)?;
            let right = plan(catalog, &children[1], Limit::unbounded(), opts)?;
            Ok(
                OperatorNode::new(Operator::Join(JoinOp::new(*join_type, predicate.clone())))
                    .with_left(left)
                    .with_right(right),
            )
        }

        LogicalNode::Group { expressions, .. } => Ok(OperatorNode::new(Operator::Group(
            build_group(expressions)?,
        ))),

        LogicalNode::Sort { expressions, .. } => Ok(OperatorNode::new(Operator::Sort(
            SortOp::new(expressions.clone()),
        ))),

        LogicalNode::Limit { limit, child } => plan(catalog, child, *limit, opts),

        LogicalNode::Data { payload } => Ok(OperatorNode::new(Operator::RawData(RawData::new(
            payload.clone(),
        )))),

        LogicalNode::CreateIndex { .. } | LogicalNode::DropIndex { .. } => Err(
            ShaleError::Unsupported("secondary indexes are not supported".into()),
        ),

        LogicalNode::Function { function } => Err(ShaleError::Unsupported(format!(
            "function '{}' has no physical plan",
            function.name
        ))),

        other => Err(ShaleError::Unsupported(format!(
            "node {:?} is executed by the engine, not planned",
            other.kind()
        ))),
    }
}

/// `match` routing: `_id = $param` over a document-table goes through the
/// primary-key hash; everything else scans.
fn plan_match(
    catalog: &Catalog,
    collection: &CollectionName,
    predicate: Option<&crate::expr::CompareExpr>,
    limit: Limit,
    opts: PlanOptions,
) -> Result<OperatorNode, ShaleError> {
    let table = catalog.get_table(collection)?;
    let storage = table
        .read()
        .map_err(|_| ShaleError::Internal("table lock poisoned".into()))?
        .storage;

    if storage == StorageKind::DocumentTable {
        if let Some(expr) = predicate {
            if expr.is_point_lookup(ID_PATH) {
                return Ok(OperatorNode::new(Operator::PrimaryKeyScan(
                    PrimaryKeyScan::new(table, Some(expr.clone())),
                )));
            }
        }
    }
    let mut scan = FullScan::new(table, predicate.cloned(), limit);
    scan.set_batch_rows(opts.scan_batch_rows);
    Ok(OperatorNode::new(Operator::FullScan(scan)))
}

/// `aggregate` composes match → group → sort around a scan.
fn plan_aggregate(
    catalog: &Catalog,
    collection: &CollectionName,
    children: &[LogicalNode],
    limit: Limit,
    opts: PlanOptions,
) -> Result<OperatorNode, ShaleError> {
    let has_reshaping = children
        .iter()
        .any(|c| matches!(c.kind(), NodeKind::Group | NodeKind::Sort));

    // The scan limit only applies when no group/sort reshapes cardinality
    // after it.
    let scan_limit = if has_reshaping { Limit::unbounded() } else { limit };
    let match_pred = children.iter().find_map(|c| match c {
        LogicalNode::Match { predicate, .. } => Some(predicate.as_ref()),
        _ => None,
    });
    let mut current = plan_match(catalog, collection, match_pred.flatten(), scan_limit, opts)?;

    for child in children {
        match child {
            LogicalNode::Group { expressions, .. } => {
                current = OperatorNode::new(Operator::Group(build_group(expressions)?))
                    .with_left(current);
            }
            LogicalNode::Sort { expressions, .. } => {
                current = OperatorNode::new(Operator::Sort(SortOp::new(expressions.clone())))
                    .with_left(current);
            }
            LogicalNode::Match { .. } => {}
            other => {
                return Err(ShaleError::Unsupported(format!(
                    "aggregate child {:?} is not supported",
                    other.kind()
                )));
            }
        }
    }
    Ok(current)
}

/// Build a group operator from scalar (key) and aggregate expressions.
fn build_group(expressions: &[Expression]) -> Result<GroupOp, ShaleError> {
    let mut group = GroupOp::new();
    for expr in expressions {
        match expr {
            Expression::Scalar(scalar) => {
                let alias = scalar
                    .key
                    .as_str()
                    .ok_or_else(|| ShaleError::Parse("group key needs an alias".into()))?;
                let column = scalar.field_name().unwrap_or(alias);
                group.add_key(column, alias);
            }
            Expression::Aggregate(agg) => {
                let alias = agg
                    .key
                    .as_str()
                    .ok_or_else(|| ShaleError::Parse("aggregate needs an alias".into()))?;
                let column = agg
                    .arg
                    .as_ref()
                    .and_then(|k| k.as_str())
                    .filter(|name| *name != "*")
                    .map(str::to_string);
                // COUNT over a named column counts distinct values.
                let distinct =
                    agg.func == crate::expr::AggFunc::Count && column.is_some();
                group.add_aggregate(agg.func, column, alias, distinct);
            }
            other => {
                return Err(ShaleError::Unsupported(format!(
                    "group node cannot carry {other:?}"
                )));
            }
        }
    }
    Ok(group)
}
