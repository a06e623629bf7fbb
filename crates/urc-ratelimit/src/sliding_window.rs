//! Sliding window rate limiter implementation.
//!
//! Tracks the timestamp of every call in the current window, so the limit holds
//! for any window of the configured length, not just aligned ones.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::{RateLimitConfig, RateLimitError, RateLimiter};

/// Sliding window rate limiter.
///
/// At most `limit` calls start in any `window`-long interval, across every task
/// sharing the limiter.
#[derive(Debug)]
pub struct SlidingWindow {
    /// Maximum calls per window.
    limit: u32,

    /// Window duration.
    window: Duration,

    /// Start times of calls still inside the window, oldest first.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    /// Create a new sliding window rate limiter.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] if `limit` or `window` is zero.
    pub fn new(limit: u32, window: Duration) -> Result<Self, RateLimitError> {
        Self::from_config(&RateLimitConfig::new(limit, window))
    }

    /// Create from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        config.validate()?;
        Ok(Self {
            limit: config.max_calls,
            window: config.window,
            timestamps: Mutex::new(VecDeque::new()),
        })
    }

    /// Configured maximum calls per window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Drop timestamps that have left the window.
    fn purge(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest call leaves the window, or zero if there is room.
    fn wait_locked(&self, timestamps: &VecDeque<Instant>, now: Instant) -> Duration {
        if timestamps.len() < self.limit as usize {
            return Duration::ZERO;
        }
        timestamps.front().map_or(Duration::ZERO, |oldest| {
            self.window.saturating_sub(now.duration_since(*oldest))
        })
    }
}

#[async_trait]
impl RateLimiter for SlidingWindow {
    async fn acquire(&self) -> Duration {
        let start = Instant::now();

        loop {
            let wait = {
                let now = Instant::now();
                let mut timestamps = self.timestamps.lock();
                self.purge(&mut timestamps, now);

                if timestamps.len() < self.limit as usize {
                    timestamps.push_back(now);
                    return now.duration_since(start);
                }

                self.wait_locked(&timestamps, now)
            };

            // The window may have moved by the time we wake, so re-check.
            debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                limit = self.limit,
                "Rate limit reached, sleeping"
            );
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn rejects_zero_limit_and_window() {
        assert!(SlidingWindow::new(0, Duration::from_secs(1)).is_err());
        assert!(SlidingWindow::new(1, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_window_basic() {
        let limiter = SlidingWindow::new(5, Duration::from_secs(1)).unwrap();

        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.acquire().await, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_window_expiry() {
        let limiter = SlidingWindow::new(2, Duration::from_millis(100)).unwrap();

        limiter.acquire().await;
        limiter.acquire().await;

        advance(Duration::from_millis(100)).await;

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn largest_limit_does_not_preallocate() {
        let limiter = SlidingWindow::new(u32::MAX, Duration::from_secs(1)).unwrap();
        assert_eq!(limiter.limit(), u32::MAX);

        for _ in 0..1_000 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_limit_waits_for_oldest_to_expire() {
        let limiter = SlidingWindow::new(3, Duration::from_secs(1)).unwrap();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        advance(Duration::from_millis(250)).await;

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_millis(750));
        assert!(waited < limiter.window());
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_a_no_op() {
        let limiter = SlidingWindow::new(1, Duration::from_secs(1)).unwrap();
        limiter.acquire().await;
        limiter.release();

        let begin = Instant::now();
        limiter.acquire().await;
        assert_eq!(begin.elapsed(), Duration::from_secs(1));
    }
}
