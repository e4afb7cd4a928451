//! Engine configuration.
//!
//! All knobs carry conservative defaults; a caller embedding the engine can
//! deserialize an [`EngineConfig`] from JSON or build one in code. Values are
//! read once at engine construction and never change at runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a table physically stores its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Row-oriented storage, schema fixed at create time.
    Documents,
    /// Column-oriented storage, schema fixed at create time.
    #[default]
    Columns,
    /// Column-oriented storage with a dynamic schema discovered from
    /// inserted documents.
    DocumentTable,
}

impl StorageKind {
    /// Parse the `storage` option of `CREATE TABLE … WITH (storage=…)`.
    pub fn parse_option(value: &str) -> Option<StorageKind> {
        match value {
            "documents" => Some(StorageKind::Documents),
            "columns" => Some(StorageKind::Columns),
            "document_table" => Some(StorageKind::DocumentTable),
            _ => None,
        }
    }

    /// Whether this storage kind evolves its schema from inserted documents.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, StorageKind::Columns | StorageKind::DocumentTable)
    }
}

/// Engine-wide configuration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of rows per data chunk and per column block.
    ///
    /// Scans, appends, and operator outputs are all sized in multiples of
    /// this. Must be a power of two so block arithmetic stays shift-based.
    pub chunk_capacity: usize,

    /// Storage kind applied when `CREATE TABLE` names no `storage` option.
    ///
    /// A schema-less `CREATE TABLE` defaults to dynamic columnar storage.
    pub default_storage: StorageKind,

    /// Wall-clock deadline applied to each statement. When exceeded, the
    /// session sets the pipeline's cancellation flag; operators notice
    /// between chunks and return a partial, well-formed result.
    ///
    /// `None` disables the deadline.
    pub statement_timeout: Option<Duration>,

    /// Number of rows a scan materializes per pull before re-checking the
    /// cancellation flag. Bounded above by `chunk_capacity`.
    pub scan_batch_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: 2048,
            default_storage: StorageKind::Columns,
            statement_timeout: None,
            scan_batch_rows: 2048,
        }
    }
}

impl EngineConfig {
    /// Validate invariants between knobs.
    pub fn validate(&self) -> Result<(), crate::error::ShaleError> {
        if !self.chunk_capacity.is_power_of_two() {
            return Err(crate::error::ShaleError::Unsupported(format!(
                "chunk_capacity must be a power of two, got {}",
                self.chunk_capacity
            )));
        }
        if self.scan_batch_rows == 0 || self.scan_batch_rows > self.chunk_capacity {
            return Err(crate::error::ShaleError::Unsupported(format!(
                "scan_batch_rows must be in 1..={}, got {}",
                self.chunk_capacity, self.scan_batch_rows
            )));
        }
        Ok(())
    }
}
