//! Catalog error taxonomy.
//!
//! Every catalog facade implementation maps its transport- or service-specific
//! failures onto these variants so the audit engine can decide, per failure,
//! whether it is fatal for the run, scoped to one dataset, or scoped to one batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors returned by a [`CatalogClient`](crate::CatalogClient).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CatalogError {
    /// The storage endpoint is unknown to the catalog.
    #[error("Endpoint not found: {endpoint}")]
    EndpointNotFound { endpoint: String },

    /// The dataset no longer exists.
    #[error("Dataset not found: {scope}:{name}")]
    DatasetNotFound { scope: String, name: String },

    /// Connectivity or server-side failure.
    #[error("Transient catalog error: {message}")]
    Transient { message: String },

    /// The catalog rejected our credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The catalog answered with something we could not decode.
    #[error("Invalid catalog response: {message}")]
    InvalidResponse { message: String },
}

impl CatalogError {
    /// Create a transient error from any displayable cause.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether the error reports a missing endpoint or dataset.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EndpointNotFound { .. } | Self::DatasetNotFound { .. }
        )
    }

    /// Short stable label for structured logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EndpointNotFound { .. } => "endpoint_not_found",
            Self::DatasetNotFound { .. } => "dataset_not_found",
            Self::Transient { .. } => "transient",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}
