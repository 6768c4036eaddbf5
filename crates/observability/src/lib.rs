//! Process-wide tracing setup shared by every gatehouse binary.

/// Initialize tracing for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filters, formatting).
pub mod tracing;
