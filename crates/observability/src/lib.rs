//! Log/trace setup shared by tests and embedding binaries.

pub mod tracing;

/// Install process-wide tracing; repeated calls are no-ops.
pub fn init() {
    tracing::init();
}
