//! Block-backed columnar storage.
//!
//! A [`ColumnarTable`] stores rows as per-column block lists. Each block
//! holds up to `block_capacity` cells in a flat vector and carries
//! `{min, max, null_count, row_count}` metadata used by scans to skip
//! blocks a constant predicate can never match.
//!
//! Rows are identified by dense 64-bit row ids assigned at append time and
//! never recycled within a run. Deletes are logical: a per-table alive
//! bitmap masks dead rows out of scans and fetches. A hash map from
//! document id to row id (and its inverse) rides along for `_id`
//! point lookups.
//!
//! Writers serialize per table: the catalog hands out the table behind a
//! `RwLock`, scans take the read side, append/update/delete take the write
//! side. Schema changes made by an append become visible to scans
//! initialized after the append finishes.

pub mod filter;

pub use filter::{BlockStats, TableFilter};

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::document::{Document, DocumentId};
use crate::error::ShaleError;
use crate::hash::{self, KeyHashMap};
use crate::schema::ComputedSchema;
use crate::types::{LogicalType, Value};
use crate::vector::{DataChunk, Validity, Vector};

// ── Session states ─────────────────────────────────────────────────────────

/// Open append session. Holds the first row id of the batch and stands in
/// for the tail-block pin; dropping or finalizing releases it.
#[derive(Debug, Default)]
pub struct TableAppendState {
    pub row_start: u64,
    open: bool,
}

/// Open delete session.
#[derive(Debug, Default)]
pub struct TableDeleteState {
    open: bool,
}

/// Open update session.
#[derive(Debug, Default)]
pub struct TableUpdateState {
    open: bool,
}

/// Scan cursor: projected columns, optional pushdown filter, and the next
/// row to visit. The projected schema is snapshotted at initialization.
#[derive(Debug)]
pub struct TableScanState {
    column_indices: Vec<usize>,
    filter: Option<TableFilter>,
    next_row: u64,
}

/// Point-fetch state.
#[derive(Debug, Default)]
pub struct ColumnFetchState {}

// ── Storage ────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Block {
    data: Vector,
    stats: BlockStats,
}

#[derive(Debug)]
struct ColumnStorage {
    path: String,
    ty: LogicalType,
    /// Sparse block list aligned to global row ranges; `None` means the
    /// column joined the table after those rows and reads as null there.
    blocks: Vec<Option<Block>>,
}

/// Column-oriented table with logical deletes and a primary-key hash.
#[derive(Debug)]
pub struct ColumnarTable {
    block_capacity: usize,
    schema: ComputedSchema,
    columns: Vec<ColumnStorage>,
    row_count: u64,
    alive: Validity,
    alive_rows: u64,
    pk_map: KeyHashMap<DocumentId, u64>,
    pk_inverse: KeyHashMap<u64, DocumentId>,
}

impl ColumnarTable {
    pub fn new(schema: ComputedSchema, block_capacity: usize) -> Self {
        Self {
            block_capacity,
            schema,
            columns: Vec::new(),
            row_count: 0,
            alive: Validity::new(0),
            alive_rows: 0,
            pk_map: hash::key_hash_map(),
            pk_inverse: hash::key_hash_map(),
        }
    }

    pub fn schema(&self) -> &ComputedSchema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut ComputedSchema {
        &mut self.schema
    }

    /// Alive rows.
    pub fn len(&self) -> u64 {
        self.alive_rows
    }

    pub fn is_empty(&self) -> bool {
        self.alive_rows == 0
    }

    /// Total rows ever appended, dead ones included.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_row_alive(&self, row: u64) -> bool {
        row < self.row_count && self.alive.is_valid(row as usize)
    }

    /// Projected output types for scan/fetch, aliases applied.
    pub fn column_types(&self) -> Vec<LogicalType> {
        self.schema
            .column_definitions()
            .into_iter()
            .map(|(_, ty)| ty)
            .collect()
    }

    // ── Append ───────────────────────────────────────────────────────────

    pub fn initialize_append(&mut self, state: &mut TableAppendState) {
        state.row_start = self.row_count;
        state.open = true;
    }

    /// Append `chunk.size()` rows contiguously starting at the session's
    /// current row, stamping each chunk position with its new row id.
    ///
    /// The chunk's columns must match the schema's column order, which the
    /// shredder guarantees for freshly shredded batches.
    pub fn append(
        &mut self,
        chunk: &mut DataChunk,
        state: &mut TableAppendState,
    ) -> Result<(), ShaleError> {
        if !state.open {
            return Err(ShaleError::Internal("append without an open session".into()));
        }
        self.sync_with_schema()?;
        if chunk.column_count() != self.columns.len() {
            return Err(ShaleError::Bounds(format!(
                "append chunk has {} columns, table has {}",
                chunk.column_count(),
                self.columns.len()
            )));
        }
        for row in 0..chunk.size() {
            let global = self.row_count;
            for col in 0..self.columns.len() {
                let value = chunk.value(col, row)?;
                self.write_cell(col, global, &value, true)?;
            }
            self.alive.set(global as usize, true);
            self.alive_rows += 1;
            self.row_count += 1;
            chunk.set_row_id(row, global as i64);
        }
        Ok(())
    }

    /// Close the append session, releasing the tail pin.
    pub fn finalize_append(&mut self, state: &mut TableAppendState) {
        state.open = false;
    }

    // ── Delete ───────────────────────────────────────────────────────────

    pub fn initialize_delete(&mut self, state: &mut TableDeleteState) {
        state.open = true;
    }

    /// Logically delete the first `n` row ids of `ids`. Idempotent per row.
    ///
    /// Schema refcounts for the dead rows' populated cells are released, so
    /// a column whose last carrier dies disappears from the schema.
    pub fn delete_rows(
        &mut self,
        state: &mut TableDeleteState,
        ids: &[i64],
        n: usize,
    ) -> Result<usize, ShaleError> {
        if !state.open {
            return Err(ShaleError::Internal("delete without an open session".into()));
        }
        let mut deleted = 0usize;
        for &id in ids.iter().take(n) {
            let row = id as u64;
            if !self.is_row_alive(row) {
                continue;
            }
            self.release_schema_refs(row)?;
            self.alive.set(row as usize, false);
            self.alive_rows -= 1;
            deleted += 1;
            if let Some(doc_id) = self.pk_inverse.remove(&row) {
                self.pk_map.remove(&doc_id);
            }
        }
        // Keep storage positions aligned with the (possibly shrunken) schema
        // so scans initialized after this delete see consistent indices.
        self.sync_with_schema()?;
        trace!(deleted, "delete_rows");
        Ok(deleted)
    }

    // ── Update ───────────────────────────────────────────────────────────

    pub fn initialize_update(&mut self, state: &mut TableUpdateState) {
        state.open = true;
    }

    /// Overwrite cells in place. `chunk` carries the new values with its
    /// columns in schema order; `row_ids[i]` names the target row of chunk
    /// position `i`. Block ranges only widen their stats, never narrow.
    pub fn update(
        &mut self,
        state: &mut TableUpdateState,
        row_ids: &[i64],
        chunk: &DataChunk,
    ) -> Result<(), ShaleError> {
        if !state.open {
            return Err(ShaleError::Internal("update without an open session".into()));
        }
        if chunk.column_count() != self.columns.len() {
            return Err(ShaleError::Bounds(format!(
                "update chunk has {} columns, table has {}",
                chunk.column_count(),
                self.columns.len()
            )));
        }
        for i in 0..chunk.size() {
            let row = row_ids[i] as u64;
            if row >= self.row_count {
                return Err(ShaleError::Bounds(format!(
                    "update of nonexistent row {row}"
                )));
            }
            for col in 0..self.columns.len() {
                let value = chunk.value(col, i)?;
                self.write_cell(col, row, &value, false)?;
            }
        }
        Ok(())
    }

    // ── Scan ─────────────────────────────────────────────────────────────

    /// Prepare a scan producing `column_indices` (full-schema positions)
    /// with `filter` applied during scanning.
    pub fn initialize_scan(
        &self,
        column_indices: Vec<usize>,
        filter: Option<TableFilter>,
    ) -> Result<TableScanState, ShaleError> {
        for &idx in &column_indices {
            if idx >= self.schema.column_count() {
                return Err(ShaleError::Bounds(format!(
                    "scan column index {idx} out of range for {} columns",
                    self.schema.column_count()
                )));
            }
        }
        Ok(TableScanState {
            column_indices,
            filter,
            next_row: 0,
        })
    }

    /// Fill `out` with the next matching rows, up to its free capacity.
    /// Returns the number of rows produced; 0 at end of stream.
    pub fn scan(
        &self,
        out: &mut DataChunk,
        state: &mut TableScanState,
    ) -> Result<usize, ShaleError> {
        let cap = self.block_capacity as u64;
        let mut produced = 0usize;
        let mut row = state.next_row;

        while row < self.row_count && out.size() < out.capacity() {
            // Block-skip check at block boundaries.
            if row % cap == 0 {
                if let Some(f) = &state.filter {
                    let block_idx = (row / cap) as usize;
                    let skippable =
                        f.can_skip_block(&|col| self.block_stats(col, block_idx, row));
                    if skippable {
                        row = (row + cap).min(self.row_count);
                        continue;
                    }
                }
            }
            if self.alive.is_valid(row as usize) {
                let matches = match &state.filter {
                    Some(f) => f.matches_row(&|col| self.cell(col, row)),
                    None => true,
                };
                if matches {
                    let pos = out.size();
                    for (out_col, &col) in state.column_indices.iter().enumerate() {
                        let v = self.cell(col, row);
                        out.set_value(out_col, pos, &v)?;
                    }
                    out.set_row_id(pos, row as i64);
                    out.set_cardinality(pos + 1)?;
                    produced += 1;
                }
            }
            row += 1;
        }
        state.next_row = row;
        Ok(produced)
    }

    // ── Fetch ────────────────────────────────────────────────────────────

    /// Point-fetch the first `n` of `row_ids`, appending the alive ones to
    /// `out` in the given order.
    pub fn fetch(
        &self,
        out: &mut DataChunk,
        column_indices: &[usize],
        row_ids: &[i64],
        n: usize,
        _state: &mut ColumnFetchState,
    ) -> Result<usize, ShaleError> {
        let mut produced = 0usize;
        for &id in row_ids.iter().take(n) {
            let row = id as u64;
            if !self.is_row_alive(row) {
                continue;
            }
            let pos = out.size();
            for (out_col, &col) in column_indices.iter().enumerate() {
                let v = self.cell(col, row);
                out.set_value(out_col, pos, &v)?;
            }
            out.set_row_id(pos, row as i64);
            out.set_cardinality(pos + 1)?;
            produced += 1;
        }
        Ok(produced)
    }

    // ── Primary key ──────────────────────────────────────────────────────

    /// O(1) lookup of the row holding `_id = id`, alive rows only.
    pub fn get_row_id(&self, id: &DocumentId) -> Option<u64> {
        self.pk_map.get(id).copied()
    }

    pub fn document_id_of(&self, row: u64) -> Option<DocumentId> {
        self.pk_inverse.get(&row).copied()
    }

    // ── Documents ────────────────────────────────────────────────────────

    /// Shred and insert a batch of documents, evolving the schema and
    /// maintaining the primary-key map. Returns the new row ids in
    /// insertion order.
    pub fn insert_documents(&mut self, docs: &[Document]) -> Result<Vec<u64>, ShaleError> {
        let batches = crate::shredder::shred(docs, &mut self.schema, self.block_capacity)?;
        let mut row_ids = Vec::new();
        for mut batch in batches {
            let mut state = TableAppendState::default();
            self.initialize_append(&mut state);
            self.append(&mut batch.chunk, &mut state)?;
            self.finalize_append(&mut state);
            for (row, id) in batch.ids.iter().enumerate() {
                let row_id = batch.chunk.row_id(row) as u64;
                row_ids.push(row_id);
                if let Some(doc_id) = id {
                    if let Some(previous) = self.pk_map.insert(*doc_id, row_id) {
                        debug!(%doc_id, previous, row_id, "duplicate _id remapped");
                        self.pk_inverse.remove(&previous);
                    }
                    self.pk_inverse.insert(row_id, *doc_id);
                }
            }
        }
        Ok(row_ids)
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Cell read across blocks; rows outside any block read as null.
    pub fn cell(&self, col: usize, row: u64) -> Value {
        let Some(storage) = self.columns.get(col) else {
            return Value::Null;
        };
        let block_idx = (row / self.block_capacity as u64) as usize;
        let offset = (row % self.block_capacity as u64) as usize;
        match storage.blocks.get(block_idx) {
            Some(Some(block)) => block.data.value(offset).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn block_stats(&self, col: usize, block_idx: usize, block_start: u64) -> Option<BlockStats> {
        let storage = self.columns.get(col)?;
        match storage.blocks.get(block_idx) {
            Some(Some(block)) => Some(block.stats.clone()),
            // Absent block: the column reads as null across the range.
            _ => {
                let rows = (self.row_count - block_start).min(self.block_capacity as u64);
                Some(BlockStats {
                    min: None,
                    max: None,
                    null_count: rows,
                    row_count: rows,
                })
            }
        }
    }

    fn write_cell(
        &mut self,
        col: usize,
        row: u64,
        value: &Value,
        observe_stats: bool,
    ) -> Result<(), ShaleError> {
        let cap = self.block_capacity;
        let block_idx = (row / cap as u64) as usize;
        let offset = (row % cap as u64) as usize;
        let storage = &mut self.columns[col];
        if storage.blocks.len() <= block_idx {
            storage.blocks.resize_with(block_idx + 1, || None);
        }
        let ty = storage.ty.clone();
        let block = storage.blocks[block_idx].get_or_insert_with(|| Block {
            data: Vector::new(ty, cap),
            stats: BlockStats::default(),
        });
        block.data.set_value(offset, value)?;
        if observe_stats {
            block.stats.observe(value);
        } else {
            block.stats.widen(value);
        }
        Ok(())
    }

    /// Release one schema refcount per populated cell of `row`, using the
    /// union tag to attribute the right variant type.
    fn release_schema_refs(&mut self, row: u64) -> Result<(), ShaleError> {
        let infos: Vec<_> = self.schema.columns().collect();
        for info in infos.iter() {
            // Resolve storage by path: earlier releases in the same batch may
            // already have erased schema columns ahead of the storage sync.
            let Some(col) = self.columns.iter().position(|c| c.path == info.path) else {
                continue;
            };
            let value = self.cell(col, row);
            if value.is_null() {
                continue;
            }
            let ty = match &value {
                Value::Union { tag, .. } => info
                    .union_types
                    .get(*tag as usize)
                    .cloned()
                    .unwrap_or_else(|| info.ty.clone()),
                _ => info.ty.clone(),
            };
            self.schema.drop(&info.path, &ty);
        }
        Ok(())
    }

    /// Reconcile column storage with the schema: adopt new columns,
    /// convert union-promoted ones, drop erased ones.
    fn sync_with_schema(&mut self) -> Result<(), ShaleError> {
        let defs = self.schema.column_definitions();
        let mut old: HashMap<String, ColumnStorage> = self
            .columns
            .drain(..)
            .map(|c| (c.path.clone(), c))
            .collect();

        for (path, ty) in defs {
            let mut storage = match old.remove(&path) {
                Some(existing) => existing,
                None => ColumnStorage {
                    path: path.clone(),
                    ty: ty.clone(),
                    blocks: Vec::new(),
                },
            };
            if storage.ty != ty {
                Self::convert_column(&mut storage, &ty, self.block_capacity)?;
            }
            self.columns.push(storage);
        }
        for (path, _) in old {
            debug!(path, "dropping storage for erased schema column");
        }
        Ok(())
    }

    /// Rebuild a column's blocks under a widened type. Pre-promotion rows
    /// land on variant 0 with null payloads elsewhere.
    fn convert_column(
        storage: &mut ColumnStorage,
        new_ty: &LogicalType,
        cap: usize,
    ) -> Result<(), ShaleError> {
        for slot in storage.blocks.iter_mut() {
            let Some(block) = slot else { continue };
            let mut data = Vector::new(new_ty.clone(), cap);
            let mut stats = BlockStats::default();
            for row in 0..cap.min(block.stats.row_count as usize) {
                let v = block.data.value(row)?;
                data.set_value(row, &v)?;
                stats.observe(&v);
            }
            *slot = Some(Block { data, stats });
        }
        storage.ty = new_ty.clone();
        Ok(())
    }
}
