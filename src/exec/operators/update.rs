//! In-place row updates with optional upsert.

use tracing::trace;

use crate::catalog::TableRef;
use crate::document::Document;
use crate::error::ShaleError;
use crate::exec::operators::{OpResult, empty_schema_chunk, logical_row_id, write_table};
use crate::exec::predicate::Predicate;
use crate::exec::{OperatorOutput, PipelineContext};
use crate::expr::{CompareExpr, Key, KeySide, UpdateExpr};
use crate::table::{ColumnFetchState, TableUpdateState};
use crate::types::Value;
use crate::vector::DataChunk;

/// Applies `SET` expressions to every matching row of the child output.
///
/// Each update expression is either a constant assignment or an arithmetic
/// tree over the (left and right) row values. Rows whose cells actually
/// change land in `modified`; matched-but-unchanged rows land in
/// `no_modified`. When nothing matches and `upsert` is set, a synthesized
/// row built from the update expressions is appended instead.
#[derive(Debug)]
pub struct UpdateOp {
    table: TableRef,
    updates: Vec<UpdateExpr>,
    upsert: bool,
    predicate: Option<CompareExpr>,
}

impl UpdateOp {
    pub fn new(
        table: TableRef,
        updates: Vec<UpdateExpr>,
        upsert: bool,
        predicate: Option<CompareExpr>,
    ) -> Self {
        Self {
            table,
            updates,
            upsert,
            predicate,
        }
    }

    pub fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        right: Option<&OperatorOutput>,
        ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let mut entry = write_table(&self.table)?;

        let right_chunk = right.and_then(OperatorOutput::chunk);
        let left_chunk = match left.and_then(OperatorOutput::chunk) {
            Some(chunk) if !chunk.is_empty() => chunk,
            _ => {
                if !self.upsert {
                    return Ok(OpResult::chunk(empty_schema_chunk(&entry)));
                }
                return self.upsert_row(&mut entry, ctx);
            }
        };

        let predicate = self
            .predicate
            .clone()
            .map(Predicate::new)
            .unwrap_or_else(Predicate::always_true);

        // Matching rows, paired with the right-side row for join updates.
        let mut matches: Vec<(usize, usize)> = Vec::new();
        match right_chunk {
            Some(right_chunk) => {
                for i in 0..left_chunk.size() {
                    for j in 0..right_chunk.size() {
                        if predicate.check(left_chunk, Some(right_chunk), i, j, ctx.params)? {
                            matches.push((i, j));
                        }
                    }
                }
            }
            None => {
                for i in 0..left_chunk.size() {
                    if predicate.check_row(left_chunk, i, ctx.params)? {
                        matches.push((i, i));
                    }
                }
            }
        }

        if matches.is_empty() {
            if self.upsert {
                return self.upsert_row(&mut entry, ctx);
            }
            return Ok(OpResult::chunk(empty_schema_chunk(&entry)));
        }

        let types = left_chunk.types();
        let mut out = DataChunk::new(types, matches.len());
        let mut row_ids = Vec::with_capacity(matches.len());
        let mut modified = Vec::new();
        let mut no_modified = Vec::new();

        for &(i, j) in &matches {
            let row_id = logical_row_id(left_chunk, i);
            let mut values = left_chunk.row(i)?;
            let mut changed = false;

            for update in &self.updates {
                let Some(column) = update.column.as_str() else {
                    continue;
                };
                let Some(col) = left_chunk.column_index(column) else {
                    trace!(column, "update of unknown column skipped");
                    continue;
                };
                let lookup = |key: &Key| -> Result<Value, ShaleError> {
                    resolve(key, left_chunk, right_chunk, i, j)
                };
                let param = |id| ctx.params.get(id).cloned();
                let new_value = update.value.evaluate(&lookup, &param)?;
                if values[col] != new_value {
                    values[col] = new_value;
                    changed = true;
                }
            }

            out.append_row(&values, row_id)?;
            row_ids.push(row_id);
            if changed {
                modified.push(row_id as u64);
            } else {
                no_modified.push(row_id as u64);
            }
        }

        let mut state = TableUpdateState::default();
        entry.table.initialize_update(&mut state);
        entry.table.update(&mut state, &row_ids, &out)?;

        Ok(OpResult {
            output: Some(OperatorOutput::Chunk(out)),
            modified,
            no_modified,
        })
    }

    /// Append one synthesized row built from the update expressions.
    /// Column references resolve to null; constants and parameters apply.
    fn upsert_row(
        &self,
        entry: &mut crate::catalog::TableEntry,
        ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let mut doc = serde_json::Map::new();
        for update in &self.updates {
            let Some(column) = update.column.as_str() else {
                continue;
            };
            let lookup = |_: &Key| -> Result<Value, ShaleError> { Ok(Value::Null) };
            let param = |id| ctx.params.get(id).cloned();
            let value = update.value.evaluate(&lookup, &param)?;
            doc.insert(column.to_string(), value_to_json(&value));
        }
        let row_ids = entry
            .table
            .insert_documents(&[Document::new(serde_json::Value::Object(doc))])?;

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
}

fn resolve(
    key: &Key,
    left: &DataChunk,
    right: Option<&DataChunk>,
    i: usize,
    j: usize,
) -> Result<Value, ShaleError> {
    let Some(name) = key.as_str() else {
        return Ok(Value::Null);
    };
    let (chunk, row) = match key.side {
        KeySide::Right => match right {
            Some(chunk) => (chunk, j),
            None => return Ok(Value::Null),
        },
        _ => (left, i),
    };
    match chunk.column_index(name) {
        Some(col) => chunk.value(col, row),
        None => Ok(Value::Null),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value.unwrap_union() {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Float(f) => serde_json::Number::from_f64(*f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        other => match other.as_i64() {
            Some(i) => serde_json::Value::Number(i.into()),
            None => serde_json::Value::String(other.to_string()),
        },
    }
}
