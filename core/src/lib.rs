//! Reliability layer between settings-level callers and a crash-prone
//! asynchronous key-value storage backend.
//!
//! Callers queue operations; a single processor drains the queue in
//! priority order, one backend call in flight at a time, applying
//! per-attempt timeouts, error classification, and jittered exponential
//! backoff. A context monitor refuses work once the host execution
//! context has gone stale, and a telemetry sink records every
//! transition.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use prefstore_core::{MemoryBackend, Operation, Priority, SettingsStore};
//! use serde_json::json;
//!
//! # async fn example() -> prefstore_core::Result<()> {
//! let store = SettingsStore::with_defaults(Arc::new(MemoryBackend::new()));
//!
//! let mut entries = HashMap::new();
//! entries.insert("theme".to_string(), json!("dark"));
//! store
//!     .queue_operation(Operation::set(entries), Priority::Normal)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backend;
pub mod backoff;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod op;
mod queue;
mod store;

pub use backend::{BackendError, MemoryBackend, StorageBackend};
pub use backoff::BackoffPolicy;
pub use classify::{classify, classify_with};
pub use config::StoreConfig;
pub use context::{ContextInfo, ContextMonitor, ContextState, ContextThresholds};
pub use error::{ErrorKind, Result, StorageError, StoreError};
pub use op::{OpKind, Operation, OperationResult, Priority, Request, StorageArea};
pub use queue::QueueStats;
pub use store::{QueueStatus, SettingsStore};
