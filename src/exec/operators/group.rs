//! Columnar GROUP BY with hash aggregation.

use std::collections::HashMap;

use crate::error::ShaleError;
use crate::exec::operators::OpResult;
use crate::exec::{OperatorOutput, PipelineContext};
use crate::expr::AggFunc;
use crate::types::{LogicalType, TypeTag, Value};
use crate::vector::DataChunk;

/// One aggregate column specification.
#[derive(Debug, Clone)]
pub struct AggSpec {
    pub func: AggFunc,
    /// Argument column; `None` for `COUNT(*)`.
    pub column: Option<String>,
    /// Output alias.
    pub alias: String,
    /// DISTINCT counting (COUNT with a named column).
    pub distinct: bool,
}

/// Hash-aggregates the child chunk over the listed group-by key columns,
/// producing one output row per group in first-seen order. With no keys the
/// whole input is a single group, and an empty input still yields one row
/// (zero counts, null extrema).
#[derive(Debug, Default)]
pub struct GroupOp {
    keys: Vec<(String, String)>,
    aggregates: Vec<AggSpec>,
}

impl GroupOp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, column: impl Into<String>, alias: impl Into<String>) {
        self.keys.push((column.into(), alias.into()));
    }

    pub fn add_aggregate(
        &mut self,
        func: AggFunc,
        column: Option<String>,
        alias: impl Into<String>,
        distinct: bool,
    ) {
        self.aggregates.push(AggSpec {
            func,
            column,
            alias: alias.into(),
            distinct,
        });
    }

    pub fn prepare(&mut self) -> Result<(), ShaleError> {
        if self.keys.is_empty() && self.aggregates.is_empty() {
            return Err(ShaleError::Unsupported(
                "group operator needs at least one key or aggregate".into(),
            ));
        }
        for (column, _) in &self.keys {
            if column.is_empty() {
                return Err(ShaleError::Unsupported("empty group-by key".into()));
            }
        }
        Ok(())
    }

    pub fn execute(
        &mut self,
        left: Option<&OperatorOutput>,
        _ctx: &PipelineContext,
    ) -> Result<OpResult, ShaleError> {
        let Some(chunk) = left.and_then(OperatorOutput::chunk) else {
            return Err(ShaleError::Internal("group operator without input".into()));
        };

        let key_cols: Vec<Option<usize>> = self
            .keys
            .iter()
            .map(|(column, _)| chunk.column_index(column))
            .collect();
        let agg_cols: Vec<Option<usize>> = self
            .aggregates
            .iter()
            .map(|spec| spec.column.as_deref().and_then(|c| chunk.column_index(c)))
            .collect();

        // First-seen group order; the hash map only holds candidate slots.
        let mut groups: Vec<(Vec<Value>, Vec<AggState>)> = Vec::new();
        let mut index: HashMap<u64, Vec<usize>> = HashMap::new();

        for row in 0..chunk.size() {
            let key: Vec<Value> = key_cols
                .iter()
                .map(|col| match col {
                    Some(c) => chunk.value(*c, row),
                    None => Ok(Value::Null),
                })
                .collect::<Result<_, _>>()?;

            let hash = crate::hash::hash_key_values(&key);
            let slot = index
                .get(&hash)
                .and_then(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&g| keys_equal(&groups[g].0, &key))
                });
            let slot = match slot {
                Some(g) => g,
                None => {
                    let states = self.aggregates.iter().map(AggState::new).collect();
                    groups.push((key, states));
                    index.entry(hash).or_default().push(groups.len() - 1);
                    groups.len() - 1
                }
            };

            for (state, col) in groups[slot].1.iter_mut().zip(&agg_cols) {
                let value = match col {
                    Some(c) => chunk.value(*c, row)?,
                    None => Value::Null,
                };
                state.accumulate(&value);
            }
        }

        // A keyless aggregation over an empty input still reports one row.
        if groups.is_empty() && self.keys.is_empty() {
            let states = self.aggregates.iter().map(AggState::new).collect();
            groups.push((Vec::new(), states));
        }

        let out_types = self.output_types(chunk, &key_cols, &groups);
        let mut out = DataChunk::new(out_types, groups.len().max(1));
        for (row, (key, states)) in groups.iter().enumerate() {
            let mut values = key.clone();
            values.extend(states.iter().map(AggState::finish));
            out.append_row(&values, row as i64)?;
        }
        Ok(OpResult::chunk(out))
    }

    fn output_types(
        &self,
        chunk: &DataChunk,
        key_cols: &[Option<usize>],
        groups: &[(Vec<Value>, Vec<AggState>)],
    ) -> Vec<LogicalType> {
        let child_types = chunk.types();
        let mut types = Vec::with_capacity(self.keys.len() + self.aggregates.len());
        for ((_, alias), col) in self.keys.iter().zip(key_cols) {
            let mut ty = col
                .map(|c| child_types[c].clone())
                .unwrap_or(LogicalType::NA);
            ty.set_alias(alias.clone());
            types.push(ty);
        }
        for (pos, spec) in self.aggregates.iter().enumerate() {
            let ty = match spec.func {
                AggFunc::Count => LogicalType::new(TypeTag::BigInt),
                AggFunc::Avg => LogicalType::new(TypeTag::Double),
                AggFunc::Sum => {
                    let float = groups
                        .iter()
                        .any(|(_, states)| states[pos].saw_float());
                    if float {
                        LogicalType::new(TypeTag::Double)
                    } else {
                        LogicalType::new(TypeTag::BigInt)
                    }
                }
                AggFunc::Min | AggFunc::Max => spec
                    .column
                    .as_deref()
                    .and_then(|c| chunk.column_index(c))
                    .map(|c| {
                        let mut ty = child_types[c].clone();
                        ty.clear_alias();
                        ty
                    })
                    .unwrap_or(LogicalType::NA),
            };
            types.push(ty.with_alias(spec.alias.clone()));
        }
        types
    }
}

/// Group keys treat nulls as equal to each other.
fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x.is_null() && y.is_null()) || x == y)
}

// ── Aggregate accumulators ─────────────────────────────────────────────────

#[derive(Debug)]
enum AggState {
    Count {
        n: u64,
        distinct: Option<Vec<Value>>,
    },
    Sum {
        int: i64,
        float: f64,
        saw_float: bool,
        any: bool,
    },
    Avg {
        sum: f64,
        n: u64,
    },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl AggState {
    fn new(spec: &AggSpec) -> Self {
        match spec.func {
            AggFunc::Count => AggState::Count {
                n: 0,
                distinct: spec.distinct.then(Vec::new),
            },
            AggFunc::Sum => AggState::Sum {
                int: 0,
                float: 0.0,
                saw_float: false,
                any: false,
            },
            AggFunc::Avg => AggState::Avg { sum: 0.0, n: 0 },
            AggFunc::Min => AggState::Min(None),
            AggFunc::Max => AggState::Max(None),
        }
    }

    fn accumulate(&mut self, value: &Value) {
        match self {
            AggState::Count { n, distinct } => match distinct {
                // COUNT(*) counts rows; COUNT(col) counts distinct non-null
                // values of the column.
                None => *n += 1,
                Some(seen) => {
                    if !value.is_null() && !seen.contains(value) {
                        seen.push(value.clone());
                        *n += 1;
                    }
                }
            },
            AggState::Sum {
                int,
                float,
                saw_float,
                any,
            } => {
                if let Some(i) = value.as_i64() {
                    *int += i;
                    *float += i as f64;
                    *any = true;
                } else if let Some(f) = value.as_f64() {
                    *float += f;
                    *saw_float = true;
                    *any = true;
                }
            }
            AggState::Avg { sum, n } => {
                if let Some(f) = value.as_f64() {
                    *sum += f;
                    *n += 1;
                }
            }
            AggState::Min(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .is_none_or(|m| value.compare(m) == Some(std::cmp::Ordering::Less))
                {
                    *current = Some(value.clone());
                }
            }
            AggState::Max(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .is_none_or(|m| value.compare(m) == Some(std::cmp::Ordering::Greater))
                {
                    *current = Some(value.clone());
                }
            }
        }
    }

    fn finish(&self) -> Value {
        match self {
            AggState::Count { n, .. } => Value::BigInt(*n as i64),
            AggState::Sum {
                int,
                float,
                saw_float,
                any,
            } => {
                if !*any {
                    Value::Null
                } else if *saw_float {
                    Value::Double(*float)
                } else {
                    Value::BigInt(*int)
                }
            }
            AggState::Avg { sum, n } => {
                if *n == 0 {
                    Value::Null
                } else {
                    Value::Double(sum / *n as f64)
                }
            }
            // Extrema keep their original cell shape (union wrapper
            // included) so they fit the source column's output type.
            AggState::Min(v) | AggState::Max(v) => v.clone().unwrap_or(Value::Null),
        }
    }

    fn saw_float(&self) -> bool {
        matches!(self, AggState::Sum { saw_float: true, .. })
    }
}
