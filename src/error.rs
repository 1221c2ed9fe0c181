//! Error types for oblijoin.
//!
//! All failures inside the engine are represented by [`ObliviousJoinError`]
//! and propagated via `Result` to the orchestrator boundary; the CLI turns
//! them into a single diagnostic line and a nonzero exit. There is no retry
//! inside the core — a phase either completes or fails the whole query.

use std::fmt;

/// Primary error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum ObliviousJoinError {
    // ── User errors — query text is wrong ────────────────────────────────
    /// The tokenizer or parser rejected the query.
    #[error("parse error at position {position}: {message}")]
    ParseError { position: usize, message: String },

    /// A predicate the dialect recognizes but the engine does not support
    /// (e.g. a `!=` join, or a reference to an unknown alias).
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// Merging two band constraints produced an empty range.
    #[error("empty constraint intersection: {0}")]
    EmptyIntersection(String),

    /// The constraint graph is not a tree over the queried tables.
    #[error("constraint graph is cyclic or disconnected: {0}")]
    CyclicOrDisconnected(String),

    // ── Schema errors — query and data disagree ──────────────────────────
    /// A referenced column or table does not exist, or a schema is too wide.
    #[error("schema error: {0}")]
    SchemaError(String),

    // ── I/O errors — loader / writer boundary ────────────────────────────
    /// Filesystem failure while reading inputs or writing the result.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content.
    #[error("CSV format error in {path}: {message}")]
    CsvFormat { path: String, message: String },

    // ── Internal errors — should not happen ──────────────────────────────
    /// An algorithmic post-condition failed. Indicates a bug.
    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),
}

/// Classification of error origin, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Schema,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::User => write!(f, "USER"),
            ErrorKind::Schema => write!(f, "SCHEMA"),
            ErrorKind::Io => write!(f, "IO"),
            ErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl ObliviousJoinError {
    /// Classify the error for diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObliviousJoinError::ParseError { .. }
            | ObliviousJoinError::UnsupportedPredicate(_)
            | ObliviousJoinError::EmptyIntersection(_)
            | ObliviousJoinError::CyclicOrDisconnected(_) => ErrorKind::User,

            ObliviousJoinError::SchemaError(_) => ErrorKind::Schema,

            ObliviousJoinError::Io { .. } | ObliviousJoinError::CsvFormat { .. } => ErrorKind::Io,

            ObliviousJoinError::InternalInvariantViolation(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a parse failure at a token position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        ObliviousJoinError::ParseError {
            position,
            message: message.into(),
        }
    }

    /// Shorthand for an I/O failure with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ObliviousJoinError::Io {
            path: path.into(),
            source,
        }
    }
}
