//! Full table scan with predicate pushdown, projection, and limit.

use crate::catalog::TableRef;
use crate::error::ShaleError;
use crate::exec::operators::{OpResult, read_table};
use crate::exec::predicate::{Predicate, to_table_filter};
use crate::exec::PipelineContext;
use crate::expr::CompareExpr;
use crate::plan::Limit;
use crate::vector::{DEFAULT_CHUNK_CAPACITY, DataChunk};

/// Scans a table front to back, applying the predicate inside the scan when
/// it is pushable and as a post-scan row check otherwise (`NOT`, unknown
/// columns, column-to-column comparisons). The limit truncates output
/// cardinality; `-1` is unbounded and `0` short-circuits to an empty chunk.
#[derive(Debug)]
pub struct FullScan {
    table: TableRef,
    predicate: Option<CompareExpr>,
    limit: Limit,
    projection: Option<Vec<String>>,
    /// Rows pulled per scan batch before the cancellation flag is
    /// re-checked.
    batch_rows: usize,
}

impl FullScan {
    pub fn new(table: TableRef, predicate: Option<CompareExpr>, limit: Limit) -> Self {
        Self {
            table,
            predicate,
            limit,
            projection: None,
            batch_rows: DEFAULT_CHUNK_CAPACITY,
        }
    }

    pub fn set_projection(&mut self, columns: Vec<String>) {
        self.projection = Some(columns);
    }

    pub fn set_batch_rows(&mut self, batch_rows: usize) {
        self.batch_rows = batch_rows.max(1);
    }

    pub fn execute(&mut self, ctx: &PipelineContext) -> Result<OpResult, ShaleError> {
        let entry = read_table(&self.table)?;
        let defs = entry.table.schema().column_definitions();
        let all_types: Vec<_> = defs.iter().map(|(_, ty)| ty.clone()).collect();

        // Projection resolves against full-schema positions; unknown names
        // are dropped, matching the storage contract.
        let (proj_indices, out_types): (Vec<usize>, Vec<_>) = match &self.projection {
            None => (0..defs.len()).map(|i| (i, all_types[i].clone())).unzip(),
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    defs.iter()
                        .position(|(path, _)| path == name)
                        .map(|i| (i, all_types[i].clone()))
                })
                .unzip(),
        };

        let total = entry.table.len() as usize;
        let out_cap = self.limit.clamp(total).max(1);
        let mut out = DataChunk::new(out_types, out_cap);

        if !self.limit.allows(0) || total == 0 {
            return Ok(OpResult::chunk(out));
        }

        // Push the predicate into the scan when possible; otherwise keep it
        // as a post-scan row check over the unfiltered scan.
        let (filter, post) = match to_table_filter(self.predicate.as_ref(), &defs, ctx.params) {
            Ok(filter) => (filter, None),
            Err(ShaleError::Unsupported(_)) => (
                None,
                self.predicate.clone().map(Predicate::new),
            ),
            Err(other) => return Err(other),
        };

        let all_indices: Vec<usize> = (0..defs.len()).collect();
        let mut state = entry.table.initialize_scan(all_indices, filter)?;
        let mut batch = DataChunk::new(all_types, self.batch_rows);

        'scan: loop {
            if ctx.is_cancelled() {
                break;
            }
            batch.reset();
            if entry.table.scan(&mut batch, &mut state)? == 0 {
                break;
            }
            for row in 0..batch.size() {
                if let Some(post) = &post {
                    if !post.check_row(&batch, row, ctx.params)? {
                        continue;
                    }
                }
                if !self.limit.allows(out.size()) {
                    break 'scan;
                }
                let pos = out.size();
                for (out_col, &col) in proj_indices.iter().enumerate() {
                    let v = batch.value(col, row)?;
                    out.set_value(out_col, pos, &v)?;
                }
                out.set_row_id(pos, batch.row_id(row));
                out.set_cardinality(pos + 1)?;
            }
        }
        Ok(OpResult::chunk(out))
    }
}
