//! Rucio error types.

use reqwest::StatusCode;
use thiserror::Error;
use urc_core::{CatalogError, DatasetId};

/// Result type for Rucio operations.
pub type RucioResult<T> = Result<T, RucioError>;

/// Rucio-specific errors.
#[derive(Debug, Error)]
pub enum RucioError {
    /// HTTP/network error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error answer from the server
    #[error("Rucio API error ({status}{}): {message}", exception_suffix(.exception))]
    Api {
        /// HTTP status code
        status: u16,
        /// Value of the `ExceptionClass` header or body field
        exception: Option<String>,
        /// Error message
        message: String,
    },

    /// Body that is not the expected JSON stream
    #[error("Invalid response body at line {line}: {source}")]
    Decode {
        /// 1-based line in the stream
        line: usize,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Authentication did not yield a token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

#[allow(clippy::ref_option)]
fn exception_suffix(exception: &Option<String>) -> String {
    exception
        .as_deref()
        .map(|e| format!(", {e}"))
        .unwrap_or_default()
}

/// What a failed call was about, for not-found mapping.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// Listing datasets at an endpoint.
    Endpoint(&'a str),
    /// Listing files of a dataset.
    Dataset(&'a DatasetId),
    /// Looking up replicas.
    Replicas,
}

impl RucioError {
    /// Whether the request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::Decode { .. } | Self::Auth(_) | Self::Config(_) => false,
        }
    }

    /// Whether the server rejected the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api {
                status, exception, ..
            } => {
                *status == StatusCode::UNAUTHORIZED.as_u16()
                    || exception.as_deref() == Some("CannotAuthenticate")
            }
            Self::Auth(_) => true,
            _ => false,
        }
    }

    /// Convert to the catalog error taxonomy.
    #[must_use]
    pub fn into_catalog_error(self, subject: Subject<'_>) -> CatalogError {
        if self.is_unauthorized() {
            return CatalogError::Unauthorized {
                message: self.to_string(),
            };
        }
        if self.is_retryable() {
            return CatalogError::Transient {
                message: self.to_string(),
            };
        }

        if let Self::Api {
            status, exception, ..
        } = &self
        {
            let not_found = *status == StatusCode::NOT_FOUND.as_u16();
            match (exception.as_deref(), subject) {
                (Some("RSENotFound"), Subject::Endpoint(endpoint)) => {
                    return CatalogError::EndpointNotFound {
                        endpoint: endpoint.to_string(),
                    };
                }
                (None, Subject::Endpoint(endpoint)) if not_found => {
                    return CatalogError::EndpointNotFound {
                        endpoint: endpoint.to_string(),
                    };
                }
                (Some("DataIdentifierNotFound"), Subject::Dataset(dataset)) => {
                    return CatalogError::DatasetNotFound {
                        scope: dataset.scope.clone(),
                        name: dataset.name.clone(),
                    };
                }
                (None, Subject::Dataset(dataset)) if not_found => {
                    return CatalogError::DatasetNotFound {
                        scope: dataset.scope.clone(),
                        name: dataset.name.clone(),
                    };
                }
                _ => {}
            }
        }

        CatalogError::InvalidResponse {
            message: self.to_string(),
        }
    }
}
