//! Physical operators.
//!
//! Each operator lives in its own module and implements one `execute` step;
//! dispatch happens once, on the [`Operator`] enum. A node owns its
//! children, so the pipeline is an owned tree with the root driven by
//! [`crate::exec::execute_root`].

pub mod delete;
pub mod full_scan;
pub mod group;
pub mod insert;
pub mod join;
pub mod primary_key_scan;
pub mod raw_data;
pub mod sort;
pub mod update;

pub use delete::DeleteOp;
pub use full_scan::FullScan;
pub use group::GroupOp;
pub use insert::InsertOp;
pub use join::JoinOp;
pub use primary_key_scan::PrimaryKeyScan;
pub use raw_data::RawData;
pub use sort::SortOp;
pub use update::UpdateOp;

use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::catalog::{TableEntry, TableRef};
use crate::error::ShaleError;
use crate::exec::{OperatorOutput, PipelineContext};
use crate::vector::DataChunk;

/// What one operator execution produces.
#[derive(Debug, Default)]
pub struct OpResult {
    pub output: Option<OperatorOutput>,
    pub modified: Vec<u64>,
    pub no_modified: Vec<u64>,
}

impl OpResult {
    pub fn chunk(chunk: DataChunk) -> Self {
        Self {
            output: Some(OperatorOutput::Chunk(chunk)),
            ..Default::default()
        }
    }
}

/// The closed set of physical operators.
#[derive(Debug)]
pub enum Operator {
    RawData(RawData),
    FullScan(FullScan),
    PrimaryKeyScan(PrimaryKeyScan),
    Insert(InsertOp),
    Delete(DeleteOp),
    Update(UpdateOp),
    Group(GroupOp),
    Sort(SortOp),
    Join(JoinOp),
}

impl Operator {
    fn prepare(&mut self) -> Result<(), ShaleError> {
        match self {
            Operator::Group(op) => op.prepare(),
            // The remaining operators validate lazily at execute time.
            _ => Ok(()),
        }
    }

    fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        right: Option<&OperatorOutput>,
        ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        match self {
            Operator::RawData(op) => op.execute(),
            Operator::FullScan(op) => op.execute(ctx),
            Operator::PrimaryKeyScan(op) => op.execute(ctx),
            Operator::Insert(op) => op.execute(left, ctx),
            Operator::Delete(op) => op.execute(left, right, ctx),
            Operator::Update(op) => op.execute(left, right, ctx),
            Operator::Group(op) => op.execute(left, ctx),
            Operator::Sort(op) => op.execute(left),
            Operator::Join(op) => op.execute(left, right, ctx),
        }
    }
}

/// A node in the operator tree: the operator plus up to two owned children
/// and the last execution's results.
#[derive(Debug)]
pub struct OperatorNode {
    pub op: Operator,
    pub left: Option<Box<OperatorNode>>,
    pub right: Option<Box<OperatorNode>>,
    pub output: Option<OperatorOutput>,
    pub modified: Vec<u64>,
    pub no_modified: Vec<u64>,
}

impl OperatorNode {
    pub fn new(op: Operator) -> Self {
        Self {
            op,
            left: None,
            right: None,
            output: None,
            modified: Vec::new(),
            no_modified: Vec::new(),
        }
    }

    pub fn with_left(mut self, child: OperatorNode) -> Self {
        self.left = Some(Box::new(child));
        self
    }

    pub fn with_right(mut self, child: OperatorNode) -> Self {
        self.right = Some(Box::new(child));
        self
    }

    /// Recursively prepare children, then this operator.
    pub fn prepare(&mut self) -> Result<(), ShaleError> {
        if let Some(left) = &mut self.left {
            left.prepare()?;
        }
        if let Some(right) = &mut self.right {
            right.prepare()?;
        }
        self.op.prepare()
    }

    /// Pull-mode execution: children first, then this operator over their
    /// outputs.
    pub fn execute(&mut self, ctx: &PipelineContext) -> Result<(), ShaleError> {
        if let Some(left) = &mut self.left {
            left.execute(ctx)?;
        }
        if let Some(right) = &mut self.right {
            right.execute(ctx)?;
        }
        let left_out = self.left.as_deref().and_then(|n| n.output.as_ref());
        let right_out = self.right.as_deref().and_then(|n| n.output.as_ref());
        let result = self.op.execute(left_out, right_out, ctx)?;
        self.output = result.output;
        self.modified = result.modified;
        self.no_modified = result.no_modified;
        Ok(())
    }

    pub fn take_output(&mut self) -> Option<OperatorOutput> {
        self.output.take()
    }
}

// ── Shared helpers ─────────────────────────────────────────────────────────

pub(crate) fn read_table(table: &TableRef) -> Result<RwLockReadGuard<'_, TableEntry>, ShaleError> {
    table
        .read()
        .map_err(|_| ShaleError::Internal("table lock poisoned".into()))
}

pub(crate) fn write_table(
    table: &TableRef,
) -> Result<RwLockWriteGuard<'_, TableEntry>, ShaleError> {
    table
        .write()
        .map_err(|_| ShaleError::Internal("table lock poisoned".into()))
}

/// Logical row id of chunk position `i`.
///
/// Dictionary-overlaid first columns resolve through their codes; flat
/// chunks read the `row_ids` column directly.
pub(crate) fn logical_row_id(chunk: &DataChunk, i: usize) -> i64 {
    match chunk.columns().first() {
        Some(col) if col.kind() == crate::vector::VectorKind::Dictionary => {
            col.logical_index(i) as i64
        }
        _ => chunk.row_id(i),
    }
}

/// Empty chunk shaped like the table's current schema.
pub(crate) fn empty_schema_chunk(entry: &TableEntry) -> DataChunk {
    DataChunk::new(entry.table.column_types(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogicalType, TypeTag, Value};
    use crate::vector::Vector;

    #[test]
    fn test_logical_row_id_flat_chunk_uses_row_ids() {
        let mut chunk = DataChunk::new(
            vec![LogicalType::new(TypeTag::BigInt).with_alias("n")],
            4,
        );
        chunk.append_row(&[Value::BigInt(1)], 40).unwrap();
        chunk.append_row(&[Value::BigInt(2)], 41).unwrap();
        assert_eq!(logical_row_id(&chunk, 0), 40);
        assert_eq!(logical_row_id(&chunk, 1), 41);
    }

    #[test]
    fn test_logical_row_id_resolves_dictionary_codes() {
        let mut dict = Vector::new(
            LogicalType::new(TypeTag::StringLiteral).with_alias("s"),
            2,
        );
        dict.set_value(0, &Value::String("a".into())).unwrap();
        dict.set_value(1, &Value::String("b".into())).unwrap();
        let overlay = Vector::dictionary(dict, vec![1, 0, 1]);
        let chunk = DataChunk::from_vectors(vec![overlay], 3).unwrap();
        // Dictionary codes are the logical row offsets.
        assert_eq!(logical_row_id(&chunk, 0), 1);
        assert_eq!(logical_row_id(&chunk, 1), 0);
        assert_eq!(logical_row_id(&chunk, 2), 1);
    }
}
