//! Leaf operator that emits a pre-built payload.

use crate::exec::operators::OpResult;
use crate::exec::OperatorOutput;
use crate::error::ShaleError;
use crate::plan::DataPayload;

/// Emits the documents or chunk a `data` plan node carried. Insert trees
/// use it as their child; pre-shredded SQL payloads pass through untouched.
#[derive(Debug)]
pub struct RawData {
    payload: DataPayload,
}

impl RawData {
    pub fn new(payload: DataPayload) -> Self {
        Self { payload }
    }

    pub fn execute(&mut self) -> Result<OpResult, ShaleError> {
        let output = match &self.payload {
            DataPayload::Documents(docs) => OperatorOutput::Documents(docs.clone()),
            DataPayload::Chunk(chunk) => OperatorOutput::Chunk(chunk.clone()),
        };
        Ok(OpResult {
            output: Some(output),
            modified: Vec::new(),
            no_modified: Vec::new(),
        })
    }
}
