//! Error types for shale.
//!
//! All errors that can occur within the engine are represented by [`ShaleError`].
//! Errors are propagated via `Result<T, ShaleError>` throughout the codebase;
//! the operator pipeline catches at the root and attaches the error to the
//! session cursor.
//!
//! # Error Classification
//!
//! Errors are classified into four categories that determine how the session
//! surfaces them:
//! - **User** — malformed plans, unsupported statements, schema conflicts the
//!   caller opted into. Reported verbatim.
//! - **Type** — value/type mismatches discovered during execution.
//! - **NotFound** — missing tables, namespaces, or parameters. A missing
//!   primary key during a PK scan is *not* an error (the row is skipped).
//! - **Internal** — invariant violations. Fatal to the statement, never to
//!   the process.

use std::fmt;

/// Primary error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum ShaleError {
    // ── User errors ──────────────────────────────────────────────────────
    /// A serialized plan could not be decoded, or a logical plan is malformed.
    #[error("plan parse error: {0}")]
    Parse(String),

    /// `try_append` rejected a document field because the column already
    /// holds a different, non-union type. Only raised when the caller opts
    /// into strict mode; the default `append` widens to a union instead.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// The statement uses a feature this storage kind does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    // ── Type errors ──────────────────────────────────────────────────────
    /// A value was coerced to a type that cannot hold it, or a union tag
    /// was requested for a variant the column does not carry.
    #[error("type error: {0}")]
    Type(String),

    /// A column index or row offset is out of range, or a chunk exceeded
    /// its capacity.
    #[error("out of bounds: {0}")]
    Bounds(String),

    // ── Lookup errors ────────────────────────────────────────────────────
    /// A named table, namespace, registered type, or bind parameter does
    /// not exist.
    #[error("not found: {0}")]
    NotFound(String),

    // ── Internal errors — should not happen ──────────────────────────────
    /// An unexpected internal error. Indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of error severity/kind for the session cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaleErrorKind {
    User,
    Type,
    NotFound,
    Internal,
}

impl fmt::Display for ShaleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaleErrorKind::User => write!(f, "USER"),
            ShaleErrorKind::Type => write!(f, "TYPE"),
            ShaleErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ShaleErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl ShaleError {
    /// Classify the error for the session cursor and monitoring.
    pub fn kind(&self) -> ShaleErrorKind {
        match self {
            ShaleError::Parse(_) | ShaleError::SchemaConflict(_) | ShaleError::Unsupported(_) => {
                ShaleErrorKind::User
            }
            ShaleError::Type(_) | ShaleError::Bounds(_) => ShaleErrorKind::Type,
            ShaleError::NotFound(_) => ShaleErrorKind::NotFound,
            ShaleError::Internal(_) => ShaleErrorKind::Internal,
        }
    }

    /// Whether the statement that produced this error left the table
    /// unmodified. Write operators apply their mutations last, so every
    /// kind except `Internal` guarantees a clean table.
    pub fn is_clean_failure(&self) -> bool {
        !matches!(self, ShaleError::Internal(_))
    }
}
