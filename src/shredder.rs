//! The shredder: documents in, aligned column chunks out.
//!
//! Shredding drives schema evolution. Every leaf of every document in the
//! batch is registered with the computed schema first; the output chunks are
//! then laid out over the union of all paths seen in the batch plus the
//! schema's pre-existing columns. A document that lacks a column leaves the
//! cell invalid; a value landing in a union column is written as
//! `{tag, payload}` with the variant tag the schema assigned.

use tracing::debug;

use crate::document::{Document, DocumentId};
use crate::error::ShaleError;
use crate::schema::ComputedSchema;
use crate::types::Value;
use crate::vector::DataChunk;

/// One shredded batch: a chunk plus the per-row document ids (for the
/// primary-key map). Row ids inside the chunk are assigned later, at table
/// append time.
#[derive(Debug)]
pub struct ShreddedBatch {
    pub chunk: DataChunk,
    pub ids: Vec<Option<DocumentId>>,
}

/// Shred `docs` into chunks of at most `chunk_capacity` rows, evolving
/// `schema` along the way.
///
/// Invalid documents (non-objects, empty objects) are skipped. The returned
/// batches cover the valid documents in input order.
pub fn shred(
    docs: &[Document],
    schema: &mut ComputedSchema,
    chunk_capacity: usize,
) -> Result<Vec<ShreddedBatch>, ShaleError> {
    // One pass over each document's tree; leaves feed the schema and are
    // kept for the fill phase.
    let mut shredded = Vec::with_capacity(docs.len());
    for doc in docs {
        if !doc.is_valid() {
            debug!("skipping invalid document during shred");
            continue;
        }
        let leaves = doc.iter_leaves();
        for leaf in &leaves {
            schema.append(&leaf.path, leaf.ty.clone());
        }
        shredded.push((doc.id(), leaves));
    }

    if shredded.is_empty() {
        return Ok(Vec::new());
    }

    // Chunk layout reflects the evolved schema: batch paths plus every
    // pre-existing column.
    let column_defs = schema.column_definitions();
    let types: Vec<_> = column_defs.iter().map(|(_, ty)| ty.clone()).collect();

    let mut batches = Vec::new();
    for group in shredded.chunks(chunk_capacity) {
        let mut chunk = DataChunk::new(types.clone(), chunk_capacity);
        let mut ids = Vec::with_capacity(group.len());

        for (row, (id, leaves)) in group.iter().enumerate() {
            for leaf in leaves {
                let Some(col) = schema.column_position(&leaf.path) else {
                    return Err(ShaleError::Internal(format!(
                        "shredded path '{}' missing from schema",
                        leaf.path
                    )));
                };
                let info = schema
                    .column_info(&leaf.path)
                    .ok_or_else(|| ShaleError::Internal(format!("no column info for '{}'", leaf.path)))?;
                let cell = if info.is_union {
                    let tag = schema.get_union_tag(&leaf.path, &leaf.ty)?;
                    Value::Union {
                        tag,
                        value: Box::new(leaf.value.clone()),
                    }
                } else {
                    leaf.value.clone()
                };
                chunk.set_value(col, row, &cell)?;
            }
            ids.push(*id);
        }
        chunk.set_cardinality(group.len())?;
        batches.push(ShreddedBatch { chunk, ids });
    }
    Ok(batches)
}
