//! Document and chunk insertion.

use tracing::debug;

use crate::catalog::TableRef;
use crate::config::StorageKind;
use crate::error::ShaleError;
use crate::exec::operators::{OpResult, write_table};
use crate::exec::{OperatorOutput, PipelineContext};
use crate::table::{ColumnFetchState, TableAppendState};
use crate::vector::DataChunk;

/// Inserts the child's output into the table.
///
/// A document-table child must produce a document list; each valid document
/// is shredded (driving schema evolution), appended, and registered in the
/// primary-key map. Fixed-schema tables additionally accept a pre-shredded
/// chunk. The operator's own output re-reads the freshly inserted rows in
/// insertion order; `modified` carries their row ids.
#[derive(Debug)]
pub struct InsertOp {
    table: TableRef,
}

impl InsertOp {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        _ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let mut entry = write_table(&self.table)?;

        let Some(input) = left else {
            debug!("insert with no input produces an empty result");
            let out = DataChunk::new(entry.table.column_types(), 1);
            return Ok(OpResult::chunk(out));
        };

        let row_ids: Vec<u64> = match input {
            OperatorOutput::Documents(docs) => {
                if entry.storage == StorageKind::Documents {
                    // Fixed-schema storage: reject conflicting fields
                    // instead of widening to a union.
                    for doc in docs.iter().filter(|d| d.is_valid()) {
                        for leaf in doc.iter_leaves() {
                            entry.table.schema().try_append(&leaf.path, &leaf.ty)?;
                        }
                    }
                }
                entry.table.insert_documents(docs)?
            }
            OperatorOutput::Chunk(chunk) => {
                if entry.storage == StorageKind::DocumentTable {
                    return Err(ShaleError::Unsupported(
                        "document-table insert requires a document list input".into(),
                    ));
                }
                self.append_chunk(&mut entry.table, chunk)?
            }
        };

        // Re-read the inserted rows so the output reflects post-evolution
        // column layout.
        let types = entry.table.column_types();
        let mut out = DataChunk::new(types, row_ids.len().max(1));
        if !row_ids.is_empty() {
            let ids: Vec<i64> = row_ids.iter().map(|&r| r as i64).collect();
            let column_indices: Vec<usize> = (0..entry.table.schema().column_count()).collect();
            entry.table.fetch(
                &mut out,
                &column_indices,
                &ids,
                ids.len(),
                &mut ColumnFetchState::default(),
            )?;
        }
        Ok(OpResult {
            output: Some(OperatorOutput::Chunk(out)),
            modified: row_ids,
            no_modified: Vec::new(),
        })
    }

    /// Row-table path: register the chunk's columns once, then append.
    fn append_chunk(
        &self,
        table: &mut crate::table::ColumnarTable,
        chunk: &DataChunk,
    ) -> Result<Vec<u64>, ShaleError> {
        for ty in chunk.types() {
            let Some(alias) = ty.alias().map(str::to_string) else {
                return Err(ShaleError::Unsupported(
                    "chunk insert requires aliased columns".into(),
                ));
            };
            let mut bare = ty.clone();
            bare.clear_alias();
            table.schema_mut().append(&alias, bare);
        }
        let mut owned = chunk.clone();
        let mut state = TableAppendState::default();
        table.initialize_append(&mut state);
        table.append(&mut owned, &mut state)?;
        table.finalize_append(&mut state);
        Ok(owned.row_ids().iter().map(|&id| id as u64).collect())
    }
}
