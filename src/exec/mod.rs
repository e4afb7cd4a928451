//! Physical plan execution.
//!
//! The pipeline is a tree of pull-mode operators. Each node runs two hooks
//! in order: `prepare` (recursively prepares children and validates
//! configuration) and `execute` (runs the operator once, reading the
//! children's outputs and producing its own). The caller invokes `execute`
//! on the root; errors propagate up the tree and are caught at the root,
//! where they attach to the session [`Cursor`].
//!
//! Cancellation is coarse-grained: the [`PipelineContext`] carries a flag
//! that operators check between chunks, returning a partial, well-formed
//! result when it is set. The session's wall-clock deadline sets the same
//! flag.

pub mod operators;
pub mod predicate;

use std::cell::Cell;
use std::time::Instant;

use crate::document::Document;
use crate::error::ShaleError;
use crate::plan::params::ParameterStore;
use crate::vector::DataChunk;

pub use operators::{Operator, OperatorNode};

/// Per-statement execution context.
pub struct PipelineContext<'a> {
    pub params: &'a ParameterStore,
    cancelled: Cell<bool>,
    deadline: Option<Instant>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(params: &'a ParameterStore) -> Self {
        Self {
            params,
            cancelled: Cell::new(false),
            deadline: None,
        }
    }

    pub fn with_deadline(params: &'a ParameterStore, deadline: Instant) -> Self {
        Self {
            params,
            cancelled: Cell::new(false),
            deadline: Some(deadline),
        }
    }

    /// Request cancellation; takes effect at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Whether execution should stop at the next chunk boundary. An
    /// expired deadline latches the flag.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.cancelled.set(true);
                return true;
            }
        }
        false
    }
}

/// What an operator hands to its parent: a data chunk or a document list.
#[derive(Debug, Clone)]
pub enum OperatorOutput {
    Chunk(DataChunk),
    Documents(Vec<Document>),
}

impl OperatorOutput {
    pub fn chunk(&self) -> Option<&DataChunk> {
        match self {
            OperatorOutput::Chunk(c) => Some(c),
            _ => None,
        }
    }

    pub fn documents(&self) -> Option<&[Document]> {
        match self {
            OperatorOutput::Documents(d) => Some(d),
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            OperatorOutput::Chunk(c) => c.size(),
            OperatorOutput::Documents(d) => d.len(),
        }
    }

    pub fn uses_documents(&self) -> bool {
        matches!(self, OperatorOutput::Documents(_))
    }
}

/// Result of running one statement, surfaced to the session.
#[derive(Debug, Default)]
pub struct Cursor {
    pub output: Option<OperatorOutput>,
    /// Row ids touched by a write operator.
    pub modified: Vec<u64>,
    /// Rows a predicate matched but an update left unchanged.
    pub no_modified: Vec<u64>,
    pub error: Option<ShaleError>,
}

impl Cursor {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Rows in the output, zero on error or empty output.
    pub fn row_count(&self) -> usize {
        self.output.as_ref().map(OperatorOutput::size).unwrap_or(0)
    }
}

/// Prepare and run an operator tree, catching any failure at the root.
pub fn execute_root(root: &mut OperatorNode, ctx: &PipelineContext) -> Cursor {
    let mut cursor = Cursor::default();
    let run = root.prepare().and_then(|()| root.execute(ctx));
    match run {
        Ok(()) => {
            cursor.output = root.take_output();
            cursor.modified = std::mem::take(&mut root.modified);
            cursor.no_modified = std::mem::take(&mut root.no_modified);
        }
        Err(err) => {
            tracing::debug!(error = %err, kind = %err.kind(), "statement failed");
            cursor.error = Some(err);
        }
    }
    cursor
}
