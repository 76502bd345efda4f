//! Error taxonomy for the settings store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::op::OpKind;

/// Store result type alias.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Stable category assigned to a failed storage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QuotaExceeded,
    PermissionDenied,
    Timeout,
    DataCorruption,
    ContextLost,
    Generic,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::DataCorruption => "data_corruption",
            ErrorKind::ContextLost => "context_lost",
            ErrorKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed wrapper around a raw backend failure. Built once per failed
/// attempt by the classifier and never mutated afterwards; callers see it
/// only when an operation exhausts its retries or fails non-retryably.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{op} failed ({kind}): {message}")]
pub struct StorageError {
    pub message: String,
    pub op: OpKind,
    pub kind: ErrorKind,
    pub retryable: bool,
    /// Free-form diagnostics. Values are caller-safe strings; payload
    /// contents never land here.
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl StorageError {
    /// Attach a diagnostic key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Everything a `queue_operation` future can reject with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Backpressure: the queue is at capacity and admission was refused.
    #[error("queue full: capacity of {capacity} operations reached")]
    QueueFull { capacity: usize },

    /// The queue was cleared while this operation was still pending.
    #[error("queue cleared before the operation was attempted")]
    QueueCleared,

    /// The store was destroyed; no further operations are accepted.
    #[error("settings store has been destroyed")]
    Shutdown,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// The storage classification, when this error came from an attempt.
    pub fn storage_kind(&self) -> Option<ErrorKind> {
        match self {
            StoreError::Storage(err) => Some(err.kind),
            _ => None,
        }
    }
}
