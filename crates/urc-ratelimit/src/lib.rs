//! URC Rate Limit - Shared call gate for catalog requests
//!
//! Bounds the rate of calls issued to the replica catalog independently of how
//! many workers are issuing them:
//!
//! - **Algorithm**: sliding window over the timestamps of recent calls
//! - **Delay, never deny**: callers are suspended until a slot frees up
//! - **Async-First**: thread-safe; the internal lock is never held while waiting
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use urc_ratelimit::{RateLimiter, SlidingWindow};
//!
//! // At most 10 catalog calls in any 1 second window
//! let limiter = SlidingWindow::new(10, std::time::Duration::from_secs(1))?;
//!
//! limiter.acquire().await;
//! let files = catalog.list_files(&dataset).await;
//! limiter.release();
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod sliding_window;

pub use sliding_window::*;

use std::time::Duration;

use async_trait::async_trait;

/// Common trait for call gates.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Take a slot, waiting as long as necessary.
    ///
    /// Returns the time spent waiting. Never fails: the gate only delays.
    async fn acquire(&self) -> Duration;

    /// Signal that a gated call finished.
    ///
    /// Gates that only throttle call initiation ignore this.
    fn release(&self) {}
}

/// Rate limit error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Invalid configuration.
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for rate limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitConfig {
    /// Maximum calls per window.
    pub max_calls: u32,

    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new rate limit configuration.
    #[must_use]
    pub const fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }

    /// Build a configuration from operator-supplied values.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] if `max_calls` is not positive or
    /// `window_secs` is not a positive finite number of seconds.
    pub fn from_parts(max_calls: i64, window_secs: f64) -> Result<Self, RateLimitError> {
        let max_calls = u32::try_from(max_calls)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                RateLimitError::InvalidConfig(format!(
                    "max calls must be a positive integer, got {max_calls}"
                ))
            })?;

        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(RateLimitError::InvalidConfig(format!(
                "time window must be a positive number of seconds, got {window_secs}"
            )));
        }

        let window = Duration::try_from_secs_f64(window_secs)
            .map_err(|e| RateLimitError::InvalidConfig(format!("time window: {e}")))?;

        let config = Self::new(max_calls, window);
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive a limiter.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] for a zero call count or window.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_calls == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max calls must be at least 1".into(),
            ));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::InvalidConfig(
                "time window must be longer than zero".into(),
            ));
        }
        Ok(())
    }

    /// Common preset: 10 calls per second.
    #[must_use]
    pub const fn ten_per_second() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::ten_per_second()
    }
}
