//! Numbered bind parameters.
//!
//! Each statement carries a [`ParameterStore`] mapping dense parameter ids
//! to logical values. The planner allocates ids while transforming the
//! statement; operators resolve them at execution time through the pipeline
//! context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ShaleError;
use crate::types::Value;

/// Identifier of one bind parameter, dense within a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ParamId(pub u16);

/// Parameter table attached to a statement.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: HashMap<ParamId, Value>,
    counter: u16,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free id. Ids stay dense as long as callers only allocate
    /// through `add`.
    pub fn next_id(&mut self) -> ParamId {
        let id = ParamId(self.counter);
        self.counter += 1;
        id
    }

    /// Allocate an id and bind `value` to it.
    pub fn add(&mut self, value: Value) -> ParamId {
        let id = self.next_id();
        self.values.insert(id, value);
        id
    }

    /// Bind `value` under an explicit id (wire deserialization).
    pub fn bind(&mut self, id: ParamId, value: Value) {
        self.counter = self.counter.max(id.0.saturating_add(1));
        self.values.insert(id, value);
    }

    pub fn get(&self, id: ParamId) -> Result<&Value, ShaleError> {
        self.values
            .get(&id)
            .ok_or_else(|| ShaleError::NotFound(format!("bind parameter #{}", id.0)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameters in id order.
    pub fn iter_ordered(&self) -> Vec<(ParamId, &Value)> {
        let mut entries: Vec<_> = self.values.iter().map(|(id, v)| (*id, v)).collect();
        entries.sort_by_key(|(id, _)| id.0);
        entries
    }
}
