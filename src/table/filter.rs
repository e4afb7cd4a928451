//! Pushdown filters evaluated inside the table scan.
//!
//! A filter is a tree of `AND`, `OR`, and constant comparisons against a
//! single column. The scan applies filters row-by-row and additionally uses
//! per-block min/max metadata to skip blocks that provably contain no
//! matching row. `NOT` never reaches this layer; the planner keeps negated
//! predicates as post-scan row checks.

use std::cmp::Ordering;

use crate::expr::CompareOp;
use crate::types::Value;

/// Per-block metadata used for skip decisions.
#[derive(Debug, Clone, Default)]
pub struct BlockStats {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub null_count: u64,
    pub row_count: u64,
}

impl BlockStats {
    /// Fold one cell into the stats.
    pub fn observe(&mut self, value: &Value) {
        self.row_count += 1;
        if value.is_null() {
            self.null_count += 1;
            return;
        }
        let v = value.unwrap_union();
        match &self.min {
            Some(m) if v.compare(m) != Some(Ordering::Less) => {}
            _ => self.min = Some(v.clone()),
        }
        match &self.max {
            Some(m) if v.compare(m) != Some(Ordering::Greater) => {}
            _ => self.max = Some(v.clone()),
        }
    }

    /// Widen the range to cover `value` without recounting rows. Used by
    /// in-place updates, where a stale-but-wide range stays conservative.
    pub fn widen(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        let v = value.unwrap_union();
        if self
            .min
            .as_ref()
            .is_none_or(|m| v.compare(m) == Some(Ordering::Less))
        {
            self.min = Some(v.clone());
        }
        if self
            .max
            .as_ref()
            .is_none_or(|m| v.compare(m) == Some(Ordering::Greater))
        {
            self.max = Some(v.clone());
        }
    }
}

/// A pushdown filter tree.
#[derive(Debug, Clone)]
pub enum TableFilter {
    /// Compare the column at `column_index` (full-schema position) against
    /// a constant.
    Constant {
        op: CompareOp,
        value: Value,
        column_index: usize,
    },
    And(Vec<TableFilter>),
    Or(Vec<TableFilter>),
}

impl TableFilter {
    /// Row check through a column accessor.
    pub fn matches_row(&self, cell: &dyn Fn(usize) -> Value) -> bool {
        match self {
            TableFilter::Constant {
                op,
                value,
                column_index,
            } => op.eval(&cell(*column_index), value),
            TableFilter::And(children) => children.iter().all(|c| c.matches_row(cell)),
            TableFilter::Or(children) => children.iter().any(|c| c.matches_row(cell)),
        }
    }

    /// Columns referenced by the tree, DFS order, deduplicated,
    /// equal-position ties broken by column index.
    pub fn referenced_columns(&self) -> Vec<usize> {
        let mut cols = Vec::new();
        self.collect_columns(&mut cols);
        let mut seen = std::collections::HashSet::new();
        cols.retain(|c| seen.insert(*c));
        cols
    }

    fn collect_columns(&self, out: &mut Vec<usize>) {
        match self {
            TableFilter::Constant { column_index, .. } => out.push(*column_index),
            TableFilter::And(children) | TableFilter::Or(children) => {
                let mut level: Vec<usize> = Vec::new();
                for child in children {
                    if let TableFilter::Constant { column_index, .. } = child {
                        level.push(*column_index);
                    }
                }
                level.sort_unstable();
                out.extend(level);
                for child in children {
                    if !matches!(child, TableFilter::Constant { .. }) {
                        child.collect_columns(out);
                    }
                }
            }
        }
    }

    /// Whether a block can be skipped outright given per-column stats.
    ///
    /// `stats` returns the block stats for a full-schema column position.
    /// Conservative: only `true` when no row in the block can satisfy the
    /// filter.
    pub fn can_skip_block(&self, stats: &dyn Fn(usize) -> Option<BlockStats>) -> bool {
        match self {
            TableFilter::Constant {
                op,
                value,
                column_index,
            } => {
                let Some(s) = stats(*column_index) else {
                    return false;
                };
                // A block of only nulls satisfies no comparison.
                if s.null_count == s.row_count && s.row_count > 0 {
                    return true;
                }
                let (Some(min), Some(max)) = (&s.min, &s.max) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => {
                        value.compare(min) == Some(Ordering::Less)
                            || value.compare(max) == Some(Ordering::Greater)
                    }
                    CompareOp::Lt => min.compare(value) != Some(Ordering::Less),
                    CompareOp::Lte => min.compare(value) == Some(Ordering::Greater),
                    CompareOp::Gt => max.compare(value) != Some(Ordering::Greater),
                    CompareOp::Gte => max.compare(value) == Some(Ordering::Less),
                    // Inequality and regex can match anywhere in the range.
                    CompareOp::Ne | CompareOp::Regex => false,
                }
            }
            TableFilter::And(children) => children.iter().any(|c| c.can_skip_block(stats)),
            TableFilter::Or(children) => {
                !children.is_empty() && children.iter().all(|c| c.can_skip_block(stats))
            }
        }
    }
}
