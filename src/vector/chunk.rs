//! Data chunks: rectangular blocks of aligned column vectors.
//!
//! A chunk carries an ordered set of vectors, a cardinality `N` bounded by
//! the chunk capacity, and a `row_ids` column of BIGINT mapping each
//! position to its table row. All member vectors report the same logical
//! length; column aliases are unique within a chunk.

use crate::error::ShaleError;
use crate::types::{LogicalType, Value};
use crate::vector::{DEFAULT_CHUNK_CAPACITY, Vector};

/// A fixed-capacity block of aligned columns.
#[derive(Debug, Clone)]
pub struct DataChunk {
    columns: Vec<Vector>,
    row_ids: Vec<i64>,
    cardinality: usize,
    capacity: usize,
}

impl DataChunk {
    /// An empty chunk with one flat vector per type.
    pub fn new(types: Vec<LogicalType>, capacity: usize) -> Self {
        debug_assert!(unique_aliases(&types), "chunk aliases must be unique");
        let columns = types
            .into_iter()
            .map(|ty| Vector::new(ty, capacity))
            .collect();
        Self {
            columns,
            row_ids: vec![0; capacity],
            cardinality: 0,
            capacity,
        }
    }

    pub fn with_default_capacity(types: Vec<LogicalType>) -> Self {
        Self::new(types, DEFAULT_CHUNK_CAPACITY)
    }

    /// Assemble a chunk from prebuilt vectors (dictionary or constant
    /// overlays included). Row ids start zeroed.
    pub fn from_vectors(columns: Vec<Vector>, cardinality: usize) -> Result<Self, ShaleError> {
        // Constant vectors report an unbounded capacity; fall back to the
        // cardinality for the row-id allocation.
        let narrowest = columns
            .iter()
            .map(Vector::capacity)
            .min()
            .unwrap_or(cardinality);
        let capacity = if narrowest == usize::MAX {
            cardinality.max(1)
        } else {
            narrowest.max(cardinality).max(1)
        };
        let types: Vec<LogicalType> = columns.iter().map(|c| c.logical_type().clone()).collect();
        debug_assert!(unique_aliases(&types), "chunk aliases must be unique");
        let mut chunk = Self {
            columns,
            row_ids: vec![0; capacity],
            cardinality: 0,
            capacity,
        };
        chunk.set_cardinality(cardinality)?;
        Ok(chunk)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn size(&self) -> usize {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_cardinality(&mut self, n: usize) -> Result<(), ShaleError> {
        if n > self.capacity {
            return Err(ShaleError::Bounds(format!(
                "cardinality {n} exceeds chunk capacity {}",
                self.capacity
            )));
        }
        self.cardinality = n;
        Ok(())
    }

    /// Clear contents, keeping the column layout.
    pub fn reset(&mut self) {
        let types = self.types();
        *self = DataChunk::new(types, self.capacity);
    }

    /// The column types, aliases included.
    pub fn types(&self) -> Vec<LogicalType> {
        self.columns
            .iter()
            .map(|c| c.logical_type().clone())
            .collect()
    }

    pub fn column(&self, idx: usize) -> Result<&Vector, ShaleError> {
        self.columns
            .get(idx)
            .ok_or_else(|| column_bounds(idx, self.columns.len()))
    }

    pub fn column_mut(&mut self, idx: usize) -> Result<&mut Vector, ShaleError> {
        let len = self.columns.len();
        self.columns
            .get_mut(idx)
            .ok_or_else(|| column_bounds(idx, len))
    }

    pub fn columns(&self) -> &[Vector] {
        &self.columns
    }

    /// Position of the column whose alias is `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.logical_type().alias() == Some(name))
    }

    pub fn value(&self, col: usize, row: usize) -> Result<Value, ShaleError> {
        self.column(col)?.value(row)
    }

    pub fn set_value(&mut self, col: usize, row: usize, value: &Value) -> Result<(), ShaleError> {
        self.column_mut(col)?.set_value(row, value)
    }

    pub fn row_id(&self, row: usize) -> i64 {
        self.row_ids[row]
    }

    pub fn set_row_id(&mut self, row: usize, id: i64) {
        self.row_ids[row] = id;
    }

    pub fn row_ids(&self) -> &[i64] {
        &self.row_ids[..self.cardinality]
    }

    /// Append one row of values at the current cardinality.
    pub fn append_row(&mut self, values: &[Value], row_id: i64) -> Result<(), ShaleError> {
        if values.len() != self.columns.len() {
            return Err(ShaleError::Bounds(format!(
                "row width {} does not match column count {}",
                values.len(),
                self.columns.len()
            )));
        }
        let row = self.cardinality;
        if row >= self.capacity {
            return Err(ShaleError::Bounds(format!(
                "chunk capacity {} exceeded",
                self.capacity
            )));
        }
        for (col, value) in values.iter().enumerate() {
            self.columns[col].set_value(row, value)?;
        }
        self.row_ids[row] = row_id;
        self.cardinality += 1;
        Ok(())
    }

    /// One full row as owned values.
    pub fn row(&self, row: usize) -> Result<Vec<Value>, ShaleError> {
        (0..self.columns.len())
            .map(|col| self.value(col, row))
            .collect()
    }

    /// Copy this chunk's rows into `dst` starting at `row_offset`.
    ///
    /// Column layouts must match positionally. Extends `dst`'s cardinality
    /// to cover the copied range.
    pub fn copy_to(&self, dst: &mut DataChunk, row_offset: usize) -> Result<(), ShaleError> {
        if dst.column_count() != self.column_count() {
            return Err(ShaleError::Bounds(format!(
                "copy between chunks of width {} and {}",
                self.column_count(),
                dst.column_count()
            )));
        }
        for row in 0..self.cardinality {
            let target = row_offset + row;
            for col in 0..self.columns.len() {
                let v = self.value(col, row)?;
                dst.set_value(col, target, &v)?;
            }
            dst.set_row_id(target, self.row_ids[row]);
        }
        let end = row_offset + self.cardinality;
        if end > dst.cardinality {
            dst.set_cardinality(end)?;
        }
        Ok(())
    }

    /// Serialize to msgpack bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, ShaleError> {
        crate::plan::wire::serialize_chunk(self)
    }

    /// Deserialize from msgpack bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<DataChunk, ShaleError> {
        crate::plan::wire::deserialize_chunk(bytes)
    }
}

fn unique_aliases(types: &[LogicalType]) -> bool {
    let mut seen = std::collections::HashSet::new();
    types
        .iter()
        .filter_map(|t| t.alias())
        .all(|alias| seen.insert(alias))
}

fn column_bounds(idx: usize, count: usize) -> ShaleError {
    ShaleError::Bounds(format!("column index {idx} out of range for {count} columns"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    fn two_col_chunk() -> DataChunk {
        DataChunk::new(
            vec![
                LogicalType::new(TypeTag::BigInt).with_alias("a"),
                LogicalType::new(TypeTag::StringLiteral).with_alias("b"),
            ],
            8,
        )
    }

    #[test]
    fn test_append_and_read_rows() {
        let mut chunk = two_col_chunk();
        chunk
            .append_row(&[Value::BigInt(1), Value::String("x".into())], 100)
            .unwrap();
        chunk
            .append_row(&[Value::BigInt(2), Value::Null], 101)
            .unwrap();

        assert_eq!(chunk.size(), 2);
        assert_eq!(chunk.value(0, 0).unwrap(), Value::BigInt(1));
        assert_eq!(chunk.value(1, 1).unwrap(), Value::Null);
        assert_eq!(chunk.row_id(1), 101);
    }

    #[test]
    fn test_cardinality_bounded_by_capacity() {
        let mut chunk = two_col_chunk();
        assert!(chunk.set_cardinality(8).is_ok());
        assert!(chunk.set_cardinality(9).is_err());
    }

    #[test]
    fn test_column_index_by_alias() {
        let chunk = two_col_chunk();
        assert_eq!(chunk.column_index("a"), Some(0));
        assert_eq!(chunk.column_index("b"), Some(1));
        assert_eq!(chunk.column_index("c"), None);
    }

    #[test]
    fn test_reset_clears_rows_keeps_layout() {
        let mut chunk = two_col_chunk();
        chunk
            .append_row(&[Value::BigInt(1), Value::String("x".into())], 0)
            .unwrap();
        chunk.reset();
        assert_eq!(chunk.size(), 0);
        assert_eq!(chunk.column_count(), 2);
        assert_eq!(chunk.value(0, 0).unwrap(), Value::Null);
    }

    #[test]
    fn test_copy_to_offsets_rows() {
        let mut src = two_col_chunk();
        src.append_row(&[Value::BigInt(7), Value::String("y".into())], 5)
            .unwrap();
        let mut dst = two_col_chunk();
        dst.append_row(&[Value::BigInt(1), Value::String("x".into())], 4)
            .unwrap();
        src.copy_to(&mut dst, 1).unwrap();
        assert_eq!(dst.size(), 2);
        assert_eq!(dst.value(0, 1).unwrap(), Value::BigInt(7));
        assert_eq!(dst.row_id(1), 5);
    }

    #[test]
    fn test_append_row_width_mismatch() {
        let mut chunk = two_col_chunk();
        assert!(chunk.append_row(&[Value::BigInt(1)], 0).is_err());
    }
}
