//! Primary-key point lookups.

use crate::catalog::TableRef;
use crate::document::DocumentId;
use crate::error::ShaleError;
use crate::exec::operators::{OpResult, read_table};
use crate::exec::PipelineContext;
use crate::expr::CompareExpr;
use crate::table::ColumnFetchState;
use crate::types::Value;
use crate::vector::DataChunk;

/// Fetches rows by document id through the table's `_id → row_id` hash.
///
/// Ids arrive either through [`PrimaryKeyScan::append`] (API callers) or
/// from an `_id = $param` predicate resolved at execute time. Ids with no
/// live row are silently skipped, so the output carries exactly the found
/// rows. Cost is O(k) for k ids, independent of table size.
#[derive(Debug)]
pub struct PrimaryKeyScan {
    table: TableRef,
    predicate: Option<CompareExpr>,
    ids: Vec<DocumentId>,
}

impl PrimaryKeyScan {
    pub fn new(table: TableRef, predicate: Option<CompareExpr>) -> Self {
        Self {
            table,
            predicate,
            ids: Vec::new(),
        }
    }

    /// Queue a document id for the next execution.
    pub fn append(&mut self, id: DocumentId) {
        self.ids.push(id);
    }

    pub fn execute(&mut self, ctx: &PipelineContext) -> Result<OpResult, ShaleError> {
        let entry = read_table(&self.table)?;
        let types = entry.table.column_types();

        // Pull the id out of the predicate's bind parameter. Malformed ids
        // simply find nothing.
        if let Some(expr) = &self.predicate {
            if let Value::String(s) = ctx.params.get(expr.param)? {
                if let Ok(id) = DocumentId::parse(s) {
                    self.ids.push(id);
                }
            }
        }

        let mut out = DataChunk::new(types, self.ids.len().max(1));
        if self.ids.is_empty() {
            return Ok(OpResult::chunk(out));
        }

        let row_ids: Vec<i64> = self
            .ids
            .iter()
            .filter_map(|id| entry.table.get_row_id(id))
            .map(|row| row as i64)
            .collect();

        if !row_ids.is_empty() {
            let column_indices: Vec<usize> = (0..entry.table.schema().column_count()).collect();
            let mut state = ColumnFetchState::default();
            entry.table.fetch(
                &mut out,
                &column_indices,
                &row_ids,
                row_ids.len(),
                &mut state,
            )?;
        }
        Ok(OpResult::chunk(out))
    }
}
