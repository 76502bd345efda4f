//! Store configuration.

use std::time::Duration;

use crate::context::ContextThresholds;

/// Tunables recognized by [`crate::SettingsStore`]. All defaults match
/// the values the store ships with; embedders override per instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Retry attempts after the initial one before a transient failure
    /// becomes terminal.
    pub max_retries: u32,
    /// Backoff floor.
    pub base_retry_delay: Duration,
    /// Backoff ceiling.
    pub max_retry_delay: Duration,
    /// Per-attempt deadline for a backend call.
    pub operation_timeout: Duration,
    /// Backpressure limit: enqueue fails once this many entries wait.
    pub max_queue_size: usize,
    /// Whether unclassified failures are treated as transient. On by
    /// default; turning it off makes unknown errors terminal on first
    /// attempt.
    pub retry_unknown_errors: bool,
    /// Context liveness thresholds.
    pub context: ContextThresholds,
    /// Telemetry ring capacity (retained log entries).
    pub telemetry_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(5000),
            operation_timeout: Duration::from_millis(10_000),
            max_queue_size: 100,
            retry_unknown_errors: true,
            context: ContextThresholds::default(),
            telemetry_capacity: 256,
        }
    }
}
