//! In-memory sort.

use std::cmp::Ordering;

use crate::error::ShaleError;
use crate::exec::operators::OpResult;
use crate::exec::OperatorOutput;
use crate::expr::{SortExpr, SortOrder};
use crate::vector::DataChunk;

/// Sorts the full child output by a list of `(column, direction)` keys.
/// Stable: equal rows keep their input order, and later keys only break
/// ties left by earlier ones.
#[derive(Debug)]
pub struct SortOp {
    keys: Vec<SortExpr>,
}

impl SortOp {
    pub fn new(keys: Vec<SortExpr>) -> Self {
        Self { keys }
    }

    pub fn execute(&mut self, left: Option<&OperatorOutput>) -> Result<OpResult, ShaleError> {
        let Some(chunk) = left.and_then(OperatorOutput::chunk) else {
            return Err(ShaleError::Internal("sort operator without input".into()));
        };

        let key_cols: Vec<(Option<usize>, SortOrder)> = self
            .keys
            .iter()
            .map(|k| (k.key.as_str().and_then(|n| chunk.column_index(n)), k.order))
            .collect();

        // Pre-extract key values so the comparator stays infallible.
        let mut key_values: Vec<Vec<crate::types::Value>> = Vec::with_capacity(chunk.size());
        for row in 0..chunk.size() {
            let values = key_cols
                .iter()
                .map(|(col, _)| match col {
                    Some(c) => chunk.value(*c, row),
                    None => Ok(crate::types::Value::Null),
                })
                .collect::<Result<Vec<_>, _>>()?;
            key_values.push(values);
        }

        let mut order: Vec<usize> = (0..chunk.size()).collect();
        order.sort_by(|&a, &b| {
            for (pos, (_, dir)) in key_cols.iter().enumerate() {
                let cmp = key_values[a][pos].sort_cmp(&key_values[b][pos]);
                let cmp = match dir {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        let mut out = DataChunk::new(chunk.types(), chunk.size().max(1));
        for &row in &order {
            out.append_row(&chunk.row(row)?, chunk.row_id(row))?;
        }
        Ok(OpResult::chunk(out))
    }
}
