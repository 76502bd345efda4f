//! Classification of raw backend failures.
//!
//! A pure function of the failure message: case-insensitive substring
//! vocabularies map the message to an [`ErrorKind`] and a retryability
//! verdict fixed at classification time. Unmatched messages default to
//! `Generic` and retryable — most unclassified failures observed in
//! practice are transient — with the policy exposed as a toggle.

use chrono::Utc;

use crate::error::{ErrorKind, StorageError};
use crate::op::OpKind;

/// Messages longer than this are truncated before storage so a noisy
/// backend cannot balloon log volume.
const MAX_MESSAGE_LEN: usize = 256;

/// Fallback for empty or missing messages.
const UNKNOWN_MESSAGE: &str = "Unknown error";

const QUOTA_VOCAB: &[&str] = &["quota", "not enough storage"];
const PERMISSION_VOCAB: &[&str] = &["permission", "access denied", "unauthorized"];
const TIMEOUT_VOCAB: &[&str] = &["timeout", "timed out"];
const CORRUPTION_VOCAB: &[&str] = &["corrupt", "invalid data format", "checksum"];
const CONTEXT_VOCAB: &[&str] = &["context invalidated", "context lost", "invalid context"];

/// Classify with the optimistic default: unknown errors are retryable.
pub fn classify(raw: &str, op: OpKind) -> StorageError {
    classify_with(raw, op, true)
}

/// Classify a raw failure message into an immutable [`StorageError`].
///
/// `retry_unknown` decides the verdict for messages matching no known
/// vocabulary.
pub fn classify_with(raw: &str, op: OpKind, retry_unknown: bool) -> StorageError {
    let message = normalize(raw);
    let lowered = message.to_lowercase();

    let (kind, retryable) = if matches_any(&lowered, QUOTA_VOCAB) {
        (ErrorKind::QuotaExceeded, false)
    } else if matches_any(&lowered, PERMISSION_VOCAB) {
        (ErrorKind::PermissionDenied, false)
    } else if matches_any(&lowered, TIMEOUT_VOCAB) {
        (ErrorKind::Timeout, true)
    } else if matches_any(&lowered, CORRUPTION_VOCAB) {
        (ErrorKind::DataCorruption, false)
    } else if matches_any(&lowered, CONTEXT_VOCAB) {
        (ErrorKind::ContextLost, true)
    } else {
        (ErrorKind::Generic, retry_unknown)
    };

    StorageError {
        message,
        op,
        kind,
        retryable,
        context: Default::default(),
        timestamp: Utc::now(),
    }
}

/// Build the error reported when the host execution context is gone and
/// the liveness probe failed. Not retryable at this layer: only the
/// embedding caller can recreate the context.
pub fn context_lost(op: OpKind) -> StorageError {
    StorageError {
        message: "storage context lost; host context must be recreated".to_string(),
        op,
        kind: ErrorKind::ContextLost,
        retryable: false,
        context: Default::default(),
        timestamp: Utc::now(),
    }
}

fn matches_any(lowered: &str, vocab: &[&str]) -> bool {
    vocab.iter().any(|needle| lowered.contains(needle))
}

fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_MESSAGE.to_string();
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        trimmed.chars().take(MAX_MESSAGE_LEN).collect()
    } else {
        trimmed.to_string()
    }
}
