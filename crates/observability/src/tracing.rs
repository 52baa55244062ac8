//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber: JSON lines on stderr-compatible
/// stdout, filtered by `RUST_LOG` (default `info`).
///
/// Idempotent; a second call finds a subscriber already set and backs off,
/// so library tests and embedding binaries can both call it freely.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .try_init();
}
