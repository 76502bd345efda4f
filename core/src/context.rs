//! Liveness tracking for the host execution context.
//!
//! The embedding host can tear the execution context down at any time;
//! this monitor infers staleness purely from elapsed wall-clock time
//! since the context was created and since the last successful storage
//! round-trip. It never recreates the context itself.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Age thresholds driving the `Fresh -> Aging -> Stale` transitions.
#[derive(Debug, Clone, Copy)]
pub struct ContextThresholds {
    /// Without a successful round-trip for this long, the context is
    /// considered aging.
    pub aging_after: Duration,
    /// Without a successful round-trip for this long, the context is
    /// considered stale and must pass a liveness probe before use.
    pub stale_after: Duration,
    /// Hard cap on context age since creation, regardless of traffic.
    pub max_age: Duration,
}

impl Default for ContextThresholds {
    fn default() -> Self {
        Self {
            aging_after: Duration::from_secs(20),
            stale_after: Duration::from_secs(30),
            max_age: Duration::from_secs(300),
        }
    }
}

/// Computed liveness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Fresh,
    Aging,
    Stale,
}

/// Serializable view of the monitor for `queue_status()`.
#[derive(Debug, Clone, Serialize)]
pub struct ContextInfo {
    pub state: ContextState,
    pub age_ms: u64,
    pub since_last_keep_alive_ms: u64,
}

/// Process-wide context liveness tracker.
///
/// `last_keep_alive` only ever moves forward; any successful operation
/// or probe updates it.
#[derive(Debug)]
pub struct ContextMonitor {
    created_at: Instant,
    last_keep_alive: Mutex<Instant>,
    thresholds: ContextThresholds,
}

impl ContextMonitor {
    pub fn new(thresholds: ContextThresholds) -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_keep_alive: Mutex::new(now),
            thresholds,
        }
    }

    /// Record a successful storage round-trip.
    pub fn record_success(&self) {
        self.advance_keep_alive();
    }

    /// Record a successful liveness probe.
    pub fn record_probe(&self) {
        self.advance_keep_alive();
    }

    pub fn state(&self) -> ContextState {
        self.state_at(Instant::now())
    }

    /// Whether attempts may be dispatched without a probe first.
    pub fn is_valid(&self) -> bool {
        self.state() != ContextState::Stale
    }

    pub fn snapshot(&self) -> ContextInfo {
        let now = Instant::now();
        ContextInfo {
            state: self.state_at(now),
            age_ms: now.duration_since(self.created_at).as_millis() as u64,
            since_last_keep_alive_ms: now.duration_since(self.keep_alive()).as_millis() as u64,
        }
    }

    fn state_at(&self, now: Instant) -> ContextState {
        let idle = now.duration_since(self.keep_alive());
        let age = now.duration_since(self.created_at);
        if idle >= self.thresholds.stale_after || age >= self.thresholds.max_age {
            ContextState::Stale
        } else if idle >= self.thresholds.aging_after {
            ContextState::Aging
        } else {
            ContextState::Fresh
        }
    }

    fn advance_keep_alive(&self) {
        let now = Instant::now();
        let mut guard = match self.last_keep_alive.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if now > *guard {
            *guard = now;
        }
    }

    fn keep_alive(&self) -> Instant {
        match self.last_keep_alive.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for ContextMonitor {
    fn default() -> Self {
        Self::new(ContextThresholds::default())
    }
}
