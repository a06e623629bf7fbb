//! Tracing configuration for test output.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "info,urc_audit=debug";

/// Initialize tracing for tests.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Uses `RUST_LOG` if set, otherwise [`DEFAULT_TEST_FILTER`].
pub fn init_test_tracing() {
    init_test_tracing_with_filter(
        &std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_TEST_FILTER.to_string()),
    );
}

/// Initialize tracing with a specific filter.
pub fn init_test_tracing_with_filter(filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::new(filter);

        // Another test harness may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init();
    });
}
