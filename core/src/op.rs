//! Operation descriptions accepted by the store and the results they
//! settle with.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Logical name of a storage area ("local", "sync", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StorageArea(String);

impl StorageArea {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StorageArea {
    fn default() -> Self {
        Self("local".to_string())
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageArea {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The raw storage action an [`Operation`] asks for.
///
/// `Get` and `BytesInUse` take `None` to mean "everything in the area".
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Set { entries: HashMap<String, Value> },
    Get { keys: Option<Vec<String>> },
    Remove { keys: Vec<String> },
    Clear,
    BytesInUse { keys: Option<Vec<String>> },
}

/// Discriminant of a [`Request`], used for metrics and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Set,
    Get,
    Remove,
    Clear,
    BytesInUse,
}

impl OpKind {
    pub fn label(self) -> &'static str {
        match self {
            OpKind::Set => "set",
            OpKind::Get => "get",
            OpKind::Remove => "remove",
            OpKind::Clear => "clear",
            OpKind::BytesInUse => "bytes_in_use",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One requested storage action against a named area. Immutable once
/// created; the store never rewrites a caller's operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub request: Request,
    pub area: StorageArea,
}

impl Operation {
    pub fn set(entries: HashMap<String, Value>) -> Self {
        Self::new(Request::Set { entries })
    }

    pub fn get(keys: Vec<String>) -> Self {
        Self::new(Request::Get { keys: Some(keys) })
    }

    /// Fetch every key in the area.
    pub fn get_all() -> Self {
        Self::new(Request::Get { keys: None })
    }

    pub fn remove(keys: Vec<String>) -> Self {
        Self::new(Request::Remove { keys })
    }

    pub fn clear() -> Self {
        Self::new(Request::Clear)
    }

    pub fn bytes_in_use(keys: Option<Vec<String>>) -> Self {
        Self::new(Request::BytesInUse { keys })
    }

    fn new(request: Request) -> Self {
        Self {
            request,
            area: StorageArea::default(),
        }
    }

    /// Target a non-default storage area.
    pub fn in_area(mut self, area: impl Into<StorageArea>) -> Self {
        self.area = area.into();
        self
    }

    pub fn kind(&self) -> OpKind {
        match self.request {
            Request::Set { .. } => OpKind::Set,
            Request::Get { .. } => OpKind::Get,
            Request::Remove { .. } => OpKind::Remove,
            Request::Clear => OpKind::Clear,
            Request::BytesInUse { .. } => OpKind::BytesInUse,
        }
    }

    /// Caller-supplied payload, when the request carries one. Only ever
    /// handed to telemetry, which redacts it before retention.
    pub(crate) fn payload(&self) -> Option<Value> {
        match &self.request {
            Request::Set { entries } => Some(Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// Scheduling priority. Higher sorts ahead of lower; ties are FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// What a settled operation resolves with; shape depends on the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationResult {
    Set { keys: Vec<String> },
    Get { data: HashMap<String, Value> },
    Remove { removed_keys: Vec<String> },
    Clear,
    BytesInUse { bytes: u64 },
}
