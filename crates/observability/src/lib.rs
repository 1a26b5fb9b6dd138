//! Shared tracing/logging setup for warden binaries and tests.

pub use crate::tracing::{LogFormat, ObservabilityConfig};

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(&ObservabilityConfig::from_env());
}

/// Initialize process-wide logging with explicit settings.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init_with(config);
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
