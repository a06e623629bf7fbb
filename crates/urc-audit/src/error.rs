//! Audit error types.
//!
//! Only failures that make the whole run meaningless surface as [`AuditError`].
//! Per-dataset and per-batch catalog failures are absorbed by the dataset
//! worker and show up as statistics instead.

use std::path::PathBuf;

use thiserror::Error;
use urc_core::CatalogError;
use urc_ratelimit::RateLimitError;

/// Result type for audit runs.
pub type AuditResult<T> = Result<T, AuditError>;

/// Fatal audit errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Invalid run parameters, detected before any catalog call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint under audit does not exist.
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The datasets at the endpoint could not be enumerated.
    #[error("Failed to enumerate datasets at {endpoint}: {source}")]
    Enumeration {
        /// Endpoint under audit.
        endpoint: String,
        /// Underlying catalog failure.
        #[source]
        source: CatalogError,
    },

    /// The report could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl From<RateLimitError> for AuditError {
    fn from(err: RateLimitError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Errors reading or writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed CSV input.
    #[error("CSV error at line {line}: {message}")]
    Csv {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
