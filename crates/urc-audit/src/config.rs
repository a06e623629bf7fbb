//! Audit run configuration.

use serde::{Deserialize, Serialize};
use urc_ratelimit::RateLimitConfig;

use crate::{AuditError, AuditResult};

/// Configuration of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Endpoint under audit.
    pub target_rse: String,

    /// Maximum datasets processed at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Files per replica lookup.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Catalog call budget shared by every worker.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Give up on the rest of a dataset after this many consecutive failed
    /// replica batches. `None` keeps going to the last batch.
    #[serde(default)]
    pub max_consecutive_batch_failures: Option<u32>,

    /// Report progress every this many finished datasets. Zero disables it.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

const fn default_workers() -> usize {
    5
}

const fn default_batch_size() -> usize {
    100
}

const fn default_progress_interval() -> usize {
    10
}

impl AuditConfig {
    /// Create a configuration with defaults for the given endpoint.
    #[must_use]
    pub fn new(target_rse: impl Into<String>) -> Self {
        Self {
            target_rse: target_rse.into(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            rate_limit: RateLimitConfig::default(),
            max_consecutive_batch_failures: None,
            progress_interval: default_progress_interval(),
        }
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the replica lookup batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the catalog call budget.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Abort a dataset after `failures` consecutive failed batches.
    #[must_use]
    pub const fn with_max_consecutive_batch_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_batch_failures = Some(failures);
        self
    }

    /// Set the progress reporting interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Check the configuration before any work starts.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Configuration`] for an empty endpoint name, a zero
    /// worker count or batch size, or an invalid rate limit.
    pub fn validate(&self) -> AuditResult<()> {
        if self.target_rse.trim().is_empty() {
            return Err(AuditError::Configuration(
                "target endpoint name must not be empty".into(),
            ));
        }
        if self.workers == 0 {
            return Err(AuditError::Configuration(
                "worker count must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AuditError::Configuration(
                "batch size must be at least 1".into(),
            ));
        }
        if self.max_consecutive_batch_failures == Some(0) {
            return Err(AuditError::Configuration(
                "max consecutive batch failures must be at least 1".into(),
            ));
        }
        self.rate_limit.validate()?;
        Ok(())
    }
}
