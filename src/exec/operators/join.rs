//! Nested-loop joins.

use crate::error::ShaleError;
use crate::exec::operators::OpResult;
use crate::exec::predicate::Predicate;
use crate::exec::{OperatorOutput, PipelineContext};
use crate::expr::CompareExpr;
use crate::plan::JoinType;
use crate::types::{LogicalType, Value};
use crate::vector::DataChunk;

/// Nested-loop join over the two child chunks.
///
/// Emits concatenated rows; outer variants pad the missing side with nulls.
/// Output row ids come from the left side where present, from the right
/// side for right-only rows.
#[derive(Debug)]
pub struct JoinOp {
    join_type: JoinType,
    predicate: Option<CompareExpr>,
}

impl JoinOp {
    pub fn new(join_type: JoinType, predicate: Option<CompareExpr>) -> Self {
        Self {
            join_type,
            predicate,
        }
    }

    pub fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        right: Option<&OperatorOutput>,
        ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let (Some(left_chunk), Some(right_chunk)) = (
            left.and_then(OperatorOutput::chunk),
            right.and_then(OperatorOutput::chunk),
        ) else {
            return Err(ShaleError::Internal("join needs two chunk inputs".into()));
        };

        let predicate = match self.join_type {
            JoinType::Cross => Predicate::always_true(),
            _ => self
                .predicate
                .clone()
                .map(Predicate::new)
                .unwrap_or_else(Predicate::always_true),
        };

        let out_types = concat_types(left_chunk, right_chunk);
        let left_width = left_chunk.column_count();
        let l = left_chunk.size();
        let r = right_chunk.size();
        let capacity = (l * r + l + r).max(1);
        let mut out = DataChunk::new(out_types, capacity);

        let mut left_matched = vec![false; l];
        let mut right_matched = vec![false; r];

        for i in 0..l {
            if ctx.is_cancelled() {
                break;
            }
            for j in 0..r {
                if predicate.check(left_chunk, Some(right_chunk), i, j, ctx.params)? {
                    left_matched[i] = true;
                    right_matched[j] = true;
                    let mut values = left_chunk.row(i)?;
                    values.extend(right_chunk.row(j)?);
                    out.append_row(&values, left_chunk.row_id(i))?;
                }
            }
        }

        // Outer padding.
        if matches!(self.join_type, JoinType::Left | JoinType::Full) {
            for i in 0..l {
                if !left_matched[i] {
                    let mut values = left_chunk.row(i)?;
                    values.extend(std::iter::repeat_n(
                        Value::Null,
                        right_chunk.column_count(),
                    ));
                    out.append_row(&values, left_chunk.row_id(i))?;
                }
            }
        }
        if matches!(self.join_type, JoinType::Right | JoinType::Full) {
            for j in 0..r {
                if !right_matched[j] {
                    let mut values = vec![Value::Null; left_width];
                    values.extend(right_chunk.row(j)?);
                    out.append_row(&values, right_chunk.row_id(j))?;
                }
            }
        }
        Ok(OpResult::chunk(out))
    }
}

/// Concatenate the two sides' types, de-duplicating aliases so the output
/// chunk keeps the unique-alias invariant.
fn concat_types(left: &DataChunk, right: &DataChunk) -> Vec<LogicalType> {
    let mut types = left.types();
    let taken: std::collections::HashSet<String> = types
        .iter()
        .filter_map(|t| t.alias().map(str::to_string))
        .collect();
    for ty in right.types() {
        let mut ty = ty.clone();
        if let Some(alias) = ty.alias() {
            if taken.contains(alias) {
                let renamed = format!("{alias}_right");
                ty.set_alias(renamed);
            }
        }
        types.push(ty);
    }
    types
}
