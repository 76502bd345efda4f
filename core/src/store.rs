//! The settings store: queue admission and the sequential processor.
//!
//! One `SettingsStore` owns one backend handle. Operations enter a
//! priority queue and a single drain task settles them one at a time,
//! so the backend never sees two calls in flight. The drain task is
//! spawned lazily on first enqueue and parks itself when the queue
//! empties; a later enqueue spawns a fresh one.

use std::sync::Arc;
use std::time::Instant;

use prefstore_async_utils::{OrCancelExt, OrTimeoutExt};
use prefstore_telemetry::{MetricsSnapshot, Outcome, Telemetry};
use serde::Serialize;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, StorageBackend};
use crate::backoff::BackoffPolicy;
use crate::classify;
use crate::config::StoreConfig;
use crate::context::{ContextInfo, ContextMonitor};
use crate::error::{Result, StoreError};
use crate::op::{Operation, OperationResult, Priority, Request};
use crate::queue::{OperationQueue, QueueEntry, QueueStats};

/// Point-in-time view of the store for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
    pub stats: QueueStats,
    pub context: ContextInfo,
}

struct SharedState {
    queue: OperationQueue,
    /// Guards drain-task re-entrancy: exactly one loop instance runs.
    processing: bool,
    destroyed: bool,
}

struct Inner {
    config: StoreConfig,
    backend: Arc<dyn StorageBackend>,
    telemetry: Telemetry,
    context: ContextMonitor,
    shutdown: CancellationToken,
    state: Mutex<SharedState>,
}

/// Reliability layer over a crash-prone storage backend.
///
/// Cloning shares the queue, backend handle and telemetry.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn StorageBackend>, config: StoreConfig) -> Self {
        let telemetry = Telemetry::with_capacity(config.telemetry_capacity);
        let context = ContextMonitor::new(config.context);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SharedState {
                    queue: OperationQueue::new(config.max_queue_size),
                    processing: false,
                    destroyed: false,
                }),
                config,
                backend,
                telemetry,
                context,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn with_defaults(backend: Arc<dyn StorageBackend>) -> Self {
        Self::new(backend, StoreConfig::default())
    }

    /// Queue an operation and await its settlement.
    ///
    /// Rejects without touching the backend when the queue is at
    /// capacity or the store has been destroyed.
    pub async fn queue_operation(
        &self,
        operation: Operation,
        priority: Priority,
    ) -> Result<OperationResult> {
        let receiver = self.enqueue(operation, priority).await?;
        match receiver.await {
            Ok(result) => result,
            // Sender dropped without settling: the entry was discarded by
            // a non-rejecting clear.
            Err(_) => Err(StoreError::QueueCleared),
        }
    }

    async fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
    ) -> Result<oneshot::Receiver<Result<OperationResult>>> {
        let mut state = self.inner.state.lock().await;
        if state.destroyed {
            return Err(StoreError::Shutdown);
        }

        let (tx, rx) = oneshot::channel();
        let sequence = state.queue.push(operation, priority, tx)?;
        self.inner
            .telemetry
            .queue_depth(state.queue.len(), state.processing);
        tracing::debug!(
            "enqueued operation #{sequence} at {priority:?}, depth {}",
            state.queue.len()
        );

        if !state.processing {
            state.processing = true;
            tokio::spawn(drain(self.inner.clone()));
        }
        Ok(rx)
    }

    /// Start the drain loop if the queue has entries and no loop runs.
    /// Normally unnecessary; enqueue starts it on demand.
    pub async fn force_process(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.processing && !state.queue.is_empty() && !state.destroyed {
            state.processing = true;
            tokio::spawn(drain(self.inner.clone()));
        }
    }

    /// Empty the queue. With `reject_pending`, every pending future
    /// rejects with [`StoreError::QueueCleared`]; otherwise entries are
    /// discarded and their futures settle as cleared when the handles
    /// drop. The entry currently being attempted, if any, is not
    /// affected.
    pub async fn clear_queue(&self, reject_pending: bool) {
        let drained = {
            let mut state = self.inner.state.lock().await;
            state.queue.drain_all()
        };
        let count = drained.len();
        for entry in drained {
            if reject_pending {
                let _ = entry.completion.send(Err(StoreError::QueueCleared));
            }
        }
        if count > 0 {
            tracing::info!("cleared {count} pending operation(s)");
        }
    }

    /// Idempotent teardown: rejects everything pending, refuses further
    /// enqueues, and interrupts any backoff wait in progress.
    pub async fn destroy(&self) {
        let drained = {
            let mut state = self.inner.state.lock().await;
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.queue.drain_all()
        };
        self.inner.shutdown.cancel();
        let count = drained.len();
        for entry in drained {
            let _ = entry.completion.send(Err(StoreError::Shutdown));
        }
        tracing::info!("settings store destroyed, {count} pending operation(s) rejected");
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let state = self.inner.state.lock().await;
        QueueStatus {
            queue_length: state.queue.len(),
            is_processing: state.processing,
            stats: state.queue.stats(),
            context: self.inner.context.snapshot(),
        }
    }

    /// Aggregate operation metrics; O(1).
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.telemetry.metrics()
    }

    /// Handle to the telemetry sink, for embedders that render logs.
    pub fn telemetry(&self) -> Telemetry {
        self.inner.telemetry.clone()
    }
}

/// The processor loop. Holds the state lock only around queue pops and
/// the processing-flag handoff, never across an await on the backend.
async fn drain(inner: Arc<Inner>) {
    loop {
        let entry = {
            let mut state = inner.state.lock().await;
            match state.queue.pop_front() {
                Some(entry) => entry,
                None => {
                    state.processing = false;
                    return;
                }
            }
        };

        process_entry(&inner, entry).await;

        if inner.shutdown.is_cancelled() {
            let mut state = inner.state.lock().await;
            state.processing = false;
            return;
        }
    }
}

/// Attempt one dequeued entry to settlement: context check, timed
/// dispatch, classification, bounded backoff retries. Retries of this
/// entry hold the queue on purpose; strict ordering and the
/// one-in-flight invariant both depend on it.
async fn process_entry(inner: &Inner, mut entry: QueueEntry) {
    let kind = entry.operation.kind();
    let label = kind.label();
    let area = entry.operation.area.clone();
    let started = Instant::now();

    inner
        .telemetry
        .operation_started(label, area.as_str(), entry.operation.payload().as_ref());

    if !inner.context.is_valid() && !probe_context(inner, area.as_str()).await {
        let err = classify::context_lost(kind).with_context("area", area.as_str());
        tracing::warn!("context stale and probe failed; rejecting {kind} operation");
        finish(inner, label, started, Err(err.into()), entry);
        return;
    }

    let policy = BackoffPolicy {
        base: inner.config.base_retry_delay,
        max: inner.config.max_retry_delay,
    };

    loop {
        let outcome = attempt(inner, &entry.operation).await;
        match outcome {
            Ok(result) => {
                inner.context.record_success();
                tracing::debug!(
                    "{kind} operation succeeded after {} attempt(s)",
                    entry.attempt + 1
                );
                finish(inner, label, started, Ok(result), entry);
                return;
            }
            Err(err) => {
                if !err.retryable || entry.attempt >= inner.config.max_retries {
                    tracing::warn!(
                        "{kind} operation failed terminally ({}) after {} attempt(s): {}",
                        err.kind,
                        entry.attempt + 1,
                        err.message
                    );
                    let err = err.with_context("area", area.as_str());
                    finish(inner, label, started, Err(err.into()), entry);
                    return;
                }

                let delay = policy.delay(entry.attempt, Some(err.kind));
                entry.attempt += 1;
                inner.telemetry.retry_scheduled(
                    label,
                    entry.attempt,
                    delay.as_millis() as u64,
                    err.kind.label(),
                );
                tracing::debug!(
                    "{kind} operation failed ({}), retry {} in {delay:?}",
                    err.kind,
                    entry.attempt
                );

                // Backoff sleeps yield to destroy(); the backend call
                // itself is never cancelled externally.
                if tokio::time::sleep(delay)
                    .or_cancel(&inner.shutdown)
                    .await
                    .is_err()
                {
                    finish(inner, label, started, Err(StoreError::Shutdown), entry);
                    return;
                }
            }
        }
    }
}

/// One timed dispatch to the backend. A fired timer counts as a backend
/// failure with timeout vocabulary; the late result, if any, is dropped
/// with the losing select arm.
async fn attempt(
    inner: &Inner,
    operation: &Operation,
) -> std::result::Result<OperationResult, crate::error::StorageError> {
    let kind = operation.kind();
    let timeout = inner.config.operation_timeout;
    match dispatch(inner.backend.as_ref(), operation)
        .or_timeout(timeout)
        .await
    {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(raw)) => Err(classify::classify_with(
            &raw.to_string(),
            kind,
            inner.config.retry_unknown_errors,
        )),
        Err(elapsed) => Err(classify::classify_with(
            &format!("operation timed out after {:?}", elapsed.after),
            kind,
            inner.config.retry_unknown_errors,
        )),
    }
}

/// Map an operation onto the backend API and shape its result.
async fn dispatch(
    backend: &dyn StorageBackend,
    operation: &Operation,
) -> std::result::Result<OperationResult, BackendError> {
    let area = operation.area.as_str();
    match &operation.request {
        Request::Set { entries } => {
            backend.set(area, entries).await?;
            Ok(OperationResult::Set {
                keys: entries.keys().cloned().collect(),
            })
        }
        Request::Get { keys } => Ok(OperationResult::Get {
            data: backend.get(area, keys.as_deref()).await?,
        }),
        Request::Remove { keys } => {
            backend.remove(area, keys).await?;
            Ok(OperationResult::Remove {
                removed_keys: keys.clone(),
            })
        }
        Request::Clear => {
            backend.clear(area).await?;
            Ok(OperationResult::Clear)
        }
        Request::BytesInUse { keys } => Ok(OperationResult::BytesInUse {
            bytes: backend.bytes_in_use(area, keys.as_deref()).await?,
        }),
    }
}

/// Lightweight liveness check: a trivial `get` with a short deadline.
/// Success refreshes the keep-alive clock.
async fn probe_context(inner: &Inner, area: &str) -> bool {
    let deadline = inner
        .config
        .operation_timeout
        .min(std::time::Duration::from_secs(1));
    let alive = matches!(
        inner.backend.get(area, Some(&[])).or_timeout(deadline).await,
        Ok(Ok(_))
    );
    if alive {
        inner.context.record_probe();
    }
    alive
}

/// Settle the entry exactly once and record the terminal telemetry.
fn finish(
    inner: &Inner,
    label: &'static str,
    started: Instant,
    result: Result<OperationResult>,
    entry: QueueEntry,
) {
    let latency_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => inner
            .telemetry
            .operation_finished(label, Outcome::Succeeded, latency_ms, None),
        Err(err) => {
            let error_label = match err {
                StoreError::Storage(storage) => storage.kind.label(),
                StoreError::QueueCleared => "queue_cleared",
                StoreError::QueueFull { .. } => "queue_full",
                StoreError::Shutdown => "shutdown",
            };
            inner
                .telemetry
                .operation_finished(label, Outcome::Failed, latency_ms, Some(error_label));
        }
    }
    // Receiver may be gone if the caller stopped awaiting.
    let _ = entry.completion.send(result);
}
