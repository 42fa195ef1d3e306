//! Shared helpers for integration tests.

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per test binary.
///
/// Set `RUST_LOG=wiring=trace` to follow resolution.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
