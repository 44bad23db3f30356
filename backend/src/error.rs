//! Error types for the Octagon ingestion pipeline.
//!
//! - [`ExtractError`] - An extract cannot be read or has no usable header (structural)
//! - [`RowError`] - A single row failed; counted by the loader, never propagated
//! - [`StoreError`] - Store failures, including an unreachable store at start
//! - [`PipelineError`] - Top-level run errors
//! - [`ServerError`] - HTTP server errors
//! - [`ConfigError`] - Invalid environment configuration
//!
//! Field coercion never fails: normalizers map bad input to documented
//! defaults, so there is no error type for it.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RecordKind;

// =============================================================================
// Extract (structural) Errors
// =============================================================================

/// Errors that make a whole extract unusable.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Extract file missing or unreadable.
    #[error("Cannot read extract '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extract has no non-blank line.
    #[error("Extract is empty")]
    Empty,

    /// Header line produced no column names.
    #[error("No headers found in extract")]
    NoHeaders,

    /// A natural-key column is absent from the header.
    #[error("Extract for {kind} is missing key column '{column}'")]
    MissingKeyColumn { kind: RecordKind, column: String },
}

impl ExtractError {
    /// Whether the extract could not be read at all (as opposed to being
    /// readable but unusable).
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

// =============================================================================
// Row Errors
// =============================================================================

/// A single row that could not be imported.
#[derive(Debug, Error)]
pub enum RowError {
    /// Token count differs from the header's.
    #[error("Line {line}: expected {expected} fields, found {found}")]
    Malformed {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The natural key is empty.
    #[error("Line {line}: empty identity field '{field}'")]
    MissingIdentity { line: usize, field: String },

    /// The store rejected the row.
    #[error("Line {line}: {source}")]
    Persistence {
        line: usize,
        #[source]
        source: StoreError,
    },
}

impl RowError {
    pub fn line(&self) -> usize {
        match self {
            Self::Malformed { line, .. }
            | Self::MissingIdentity { line, .. }
            | Self::Persistence { line, .. } => *line,
        }
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from a [`crate::store::RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be opened. Fatal for a run.
    #[error("Store unreachable at '{}': {reason}", path.display())]
    Unreachable { path: PathBuf, reason: String },

    /// IO error while reading or writing a document.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization failed.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Natural key cannot be stored (empty or too long for a document name).
    #[error("Invalid key for {kind}: {message}")]
    InvalidKey { kind: RecordKind, message: String },

    /// Filter could not be compiled.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors for an import run.
///
/// Only [`StoreError::Unreachable`] (wrapped here) aborts a run; structural
/// errors are reported per stage in the run summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Extract error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::Pipeline(PipelineError::Store(err))
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set but cannot be parsed.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for extract reading.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
