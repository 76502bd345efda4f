//! Operation telemetry for the settings store.
//!
//! Provides a fixed-capacity ring of operation lifecycle events, keeping
//! only the most recent entries when capacity is exceeded, plus aggregate
//! counters maintained incrementally so `metrics()` never walks the ring.
//! Caller-supplied payloads are redacted before they are stored.

mod redact;

pub use redact::redact_value;

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Default maximum number of retained log entries.
const DEFAULT_CAPACITY: usize = 256;

/// Outcome of a finished operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// One operation lifecycle event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    OperationStarted {
        kind: &'static str,
        area: String,
        /// Redacted copy of the caller's payload, when one exists.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    OperationFinished {
        kind: &'static str,
        outcome: Outcome,
        latency_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RetryScheduled {
        kind: &'static str,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    QueueDepth {
        depth: usize,
        processing: bool,
    },
}

/// A timestamped entry in the telemetry ring.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Per-operation-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Point-in-time aggregate view. Cheap to produce: every field is
/// maintained incrementally as events are recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_operations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_retries: u64,
    pub average_latency_ms: f64,
    pub per_kind: BTreeMap<&'static str, KindCounters>,
    pub per_error: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct Aggregates {
    total_operations: u64,
    succeeded: u64,
    failed: u64,
    total_retries: u64,
    total_latency_ms: u64,
    per_kind: BTreeMap<&'static str, KindCounters>,
    per_error: BTreeMap<String, u64>,
}

struct TelemetryState {
    capacity: usize,
    ring: VecDeque<LogEntry>,
    agg: Aggregates,
}

/// Thread-safe telemetry sink. Cloning shares the underlying ring.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Mutex<TelemetryState>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    /// Create a sink with the default entry capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a sink retaining at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TelemetryState {
                capacity: capacity.max(1),
                ring: VecDeque::with_capacity(capacity.max(1)),
                agg: Aggregates::default(),
            })),
        }
    }

    /// Record the start of an operation attempt sequence. The payload is
    /// redacted before it is retained.
    pub fn operation_started(&self, kind: &'static str, area: &str, payload: Option<&Value>) {
        let mut state = self.lock();
        let counters = state.agg.per_kind.entry(kind).or_default();
        counters.attempted += 1;
        state.agg.total_operations += 1;
        push(
            &mut state,
            Event::OperationStarted {
                kind,
                area: area.to_string(),
                payload: payload.map(redact_value),
            },
        );
    }

    /// Record an operation settling, with its total latency and, on
    /// failure, the error kind label used for per-error aggregation.
    pub fn operation_finished(
        &self,
        kind: &'static str,
        outcome: Outcome,
        latency_ms: u64,
        error: Option<&str>,
    ) {
        let mut state = self.lock();
        let counters = state.agg.per_kind.entry(kind).or_default();
        match outcome {
            Outcome::Succeeded => {
                counters.succeeded += 1;
                state.agg.succeeded += 1;
            }
            Outcome::Failed => {
                counters.failed += 1;
                state.agg.failed += 1;
            }
        }
        state.agg.total_latency_ms += latency_ms;
        if let Some(label) = error {
            *state.agg.per_error.entry(label.to_string()).or_default() += 1;
        }
        push(
            &mut state,
            Event::OperationFinished {
                kind,
                outcome,
                latency_ms,
                error: error.map(str::to_string),
            },
        );
    }

    /// Record a scheduled retry and the backoff delay chosen for it.
    pub fn retry_scheduled(&self, kind: &'static str, attempt: u32, delay_ms: u64, error: &str) {
        let mut state = self.lock();
        state.agg.total_retries += 1;
        push(
            &mut state,
            Event::RetryScheduled {
                kind,
                attempt,
                delay_ms,
                error: error.to_string(),
            },
        );
    }

    /// Record the queue depth observed after an enqueue or dequeue.
    pub fn queue_depth(&self, depth: usize, processing: bool) {
        let mut state = self.lock();
        push(&mut state, Event::QueueDepth { depth, processing });
    }

    /// Aggregate counters. O(1) in the number of retained entries.
    pub fn metrics(&self) -> MetricsSnapshot {
        let state = self.lock();
        let settled = state.agg.succeeded + state.agg.failed;
        MetricsSnapshot {
            total_operations: state.agg.total_operations,
            succeeded: state.agg.succeeded,
            failed: state.agg.failed,
            total_retries: state.agg.total_retries,
            average_latency_ms: if settled == 0 {
                0.0
            } else {
                state.agg.total_latency_ms as f64 / settled as f64
            },
            per_kind: state.agg.per_kind.clone(),
            per_error: state.agg.per_error.clone(),
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().ring.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all retained entries. Aggregates are kept.
    pub fn clear_entries(&self) {
        self.lock().ring.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetryState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn push(state: &mut TelemetryState, event: Event) {
    if state.ring.len() == state.capacity {
        state.ring.pop_front();
    }
    state.ring.push_back(LogEntry {
        at: Utc::now(),
        event,
    });
}
