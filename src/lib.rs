//! shale — embedded analytical storage and query engine for semi-structured
//! records.
//!
//! Callers submit JSON-shaped documents; the engine stores them in a
//! columnar format under a dynamically evolving schema that discovers new
//! fields on insert and promotes conflicting fields to tagged unions. A
//! pull-mode operator pipeline executes logical plans (scan, primary-key
//! scan, insert, delete, update, group, sort, join) against the columnar
//! store with predicate pushdown.
//!
//! # Architecture
//!
//! - [`schema`] — the computed schema: refcount-versioned column catalog
//!   with additive union promotion on type conflict.
//! - [`shredder`] + [`table`] — documents to aligned column vectors, and
//!   the block-backed columnar table (append / filtered scan / delete /
//!   update / fetch, plus the `_id → row_id` primary-key hash).
//! - [`exec`] + [`planner`] — the physical operator pipeline and the
//!   logical-to-physical lowering, routed per storage kind.
//!
//! The wire format for plans and parameters is msgpack ([`plan::wire`]).

pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod exec;
pub mod expr;
pub mod hash;
pub mod plan;
pub mod planner;
pub mod schema;
pub mod shredder;
pub mod table;
pub mod types;
pub mod versioned;
pub mod vector;

pub use catalog::{Catalog, TableEntry, TableRef};
pub use config::{EngineConfig, StorageKind};
pub use document::{Document, DocumentId};
pub use engine::Engine;
pub use error::{ShaleError, ShaleErrorKind};
pub use exec::{Cursor, OperatorOutput, PipelineContext};
pub use plan::{CollectionName, Limit, LogicalNode};
pub use schema::{AppendOutcome, ComputedSchema};
pub use table::ColumnarTable;
pub use types::{LogicalType, TypeTag, Value};
pub use vector::{DataChunk, Vector};
