//! Test helpers for `domd` integration tests.
//!
//! - [`fake_backend`]: an `ExecutionBackend` that records dispatches and
//!   fabricates results, so tests can drive the coordinator without
//!   spawning real processes.
//! - [`builders`]: on-disk project fixtures (package.json, Makefile,
//!   ignore file, container config).

pub mod builders;
pub mod fake_backend;

pub use builders::ProjectBuilder;
pub use fake_backend::FakeBackend;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Uses `with_test_writer()`, so output is captured per-test and only
/// printed for failing tests (unless `-- --nocapture`). Levels come from
/// the environment, e.g. `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout so a wedged dispatch fails the
/// test instead of hanging the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("test timed out after 5 seconds")
}
