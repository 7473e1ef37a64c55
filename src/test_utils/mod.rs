//! Test utilities for the updater
//!
//! Fakes for every injected seam plus release fixtures, so the full check and
//! install state machine can be exercised without a network, a code-signing
//! toolchain or a real application bundle.
//!
//! # Example
//!
//! ```rust,no_run
//! use bundle_updater::test_utils::{FakeTransport, release_json};
//!
//! let transport = FakeTransport::new();
//! transport.push_json(200, &release_json("v2.1.0", "notes"), Some("\"etag\""));
//! ```

pub mod fakes;
pub mod fixtures;

pub use fakes::{FailingMover, FakeExtractor, FakeShell, FakeSigning, FakeTransport};
pub use fixtures::{
    TEST_OWNER, TEST_REPO, checksum_notes, release_json, release_json_flags, sample_release,
    test_config,
};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests run silent.
///
/// ```rust,no_run
/// bundle_updater::test_utils::init_test_logging(Some(tracing::Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
