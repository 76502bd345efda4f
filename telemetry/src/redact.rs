//! Best-effort redaction of sensitive fields in caller payloads.
//!
//! Field names are matched case-insensitively by substring, so "apiKey",
//! "api_key" and "MY_TOKEN" all redact. `serde_json::Value` is a tree
//! and cannot cycle, so a depth cap on the walk suffices to bound it.

use serde_json::Value;

/// Placeholder substituted for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Maximum nesting depth walked before giving up on a subtree.
const MAX_DEPTH: usize = 64;

/// Lowercase substrings that mark a field as sensitive.
const SENSITIVE_FIELDS: &[&str] = &[
    "apikey",
    "api_key",
    "password",
    "token",
    "secret",
    "credential",
    "authorization",
];

/// Return a copy of `value` with sensitive fields replaced by
/// [`REDACTED`], recursively across nested maps and lists.
pub fn redact_value(value: &Value) -> Value {
    redact_at_depth(value, 0)
}

fn redact_at_depth(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(REDACTED.to_string());
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    if is_sensitive(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_at_depth(inner, depth + 1))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_at_depth(item, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_FIELDS
        .iter()
        .any(|needle| lowered.contains(needle))
}
