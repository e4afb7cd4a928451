//! Row deletion.

use std::collections::HashSet;

use crate::catalog::TableRef;
use crate::error::ShaleError;
use crate::exec::operators::{OpResult, empty_schema_chunk, logical_row_id, write_table};
use crate::exec::predicate::Predicate;
use crate::exec::{OperatorOutput, PipelineContext};
use crate::expr::CompareExpr;
use crate::table::TableDeleteState;

/// Deletes the rows its child produced.
///
/// With one child the predicate (if any) is evaluated row-wise over the
/// child's chunk; with two children it is evaluated over the Cartesian
/// product of `(left_row, right_row)` and the left row is the delete
/// target. Row ids from dictionary-overlaid columns are normalized to
/// logical row ids before reaching the table.
#[derive(Debug)]
pub struct DeleteOp {
    table: TableRef,
    predicate: Option<CompareExpr>,
}

impl DeleteOp {
    pub fn new(table: TableRef, predicate: Option<CompareExpr>) -> Self {
        Self { table, predicate }
    }

    pub fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        right: Option<&OperatorOutput>,
        ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let mut entry = write_table(&self.table)?;

        let Some(left_chunk) = left.and_then(OperatorOutput::chunk) else {
            return Ok(OpResult::chunk(empty_schema_chunk(&entry)));
        };
        let right_chunk = right.and_then(OperatorOutput::chunk);

        let predicate = self
            .predicate
            .clone()
            .map(Predicate::new)
            .unwrap_or_else(Predicate::always_true);

        let mut ids: Vec<i64> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        match right_chunk {
            Some(right_chunk) => {
                for i in 0..left_chunk.size() {
                    for j in 0..right_chunk.size() {
                        if predicate.check(left_chunk, Some(right_chunk), i, j, ctx.params)? {
                            let id = logical_row_id(left_chunk, i);
                            if seen.insert(id) {
                                ids.push(id);
                            }
                        }
                    }
                }
            }
            None => {
                for i in 0..left_chunk.size() {
                    if predicate.check_row(left_chunk, i, ctx.params)? {
                        let id = logical_row_id(left_chunk, i);
                        if seen.insert(id) {
                            ids.push(id);
                        }
                    }
                }
            }
        }

        let mut state = TableDeleteState::default();
        entry.table.initialize_delete(&mut state);
        entry.table.delete_rows(&mut state, &ids, ids.len())?;

        let out = empty_schema_chunk(&entry);
        Ok(OpResult {
            output: Some(OperatorOutput::Chunk(out)),
            modified: ids.into_iter().map(|id| id as u64).collect(),
            no_modified: Vec::new(),
        })
    }
}
