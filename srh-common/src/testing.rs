//! Structured test logging.
//!
//! Call [`init_test_logging`] once in test setup (typically from a
//! `#[ctor::ctor]` function) to get tracing output interleaved with cargo's
//! captured test output:
//!
//! ```ignore
//! #[ctor::ctor]
//! fn setup() {
//!     srh_common::testing::init_test_logging();
//! }
//! ```
//!
//! Safe to call multiple times; initialization happens once.

use std::sync::Once;

use tracing_subscriber::prelude::*;

static TEST_LOGGING_INIT: Once = Once::new();

/// Install an env-filtered subscriber writing through the test writer.
///
/// The level comes from `SRH_TEST_LOG_LEVEL` (default `info`).
pub fn init_test_logging() {
    TEST_LOGGING_INIT.call_once(|| {
        let level = std::env::var("SRH_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(format!("srh_common={level}"))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_level(true)
            .compact();

        // Another subscriber may already be installed; losing the race is fine.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init();
    });
}
