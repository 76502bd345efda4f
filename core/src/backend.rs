//! The raw storage boundary and an in-memory implementation.
//!
//! The backend is the external collaborator this crate exists to guard:
//! an asynchronous key-value API that may fail with an
//! implementation-defined message. [`MemoryBackend`] implements it over
//! process memory with an optional byte quota, for tests and embedders
//! that want a local area alongside a real one.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Opaque backend failure. Classification happens upstream, from the
/// message alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Asynchronous storage API per named area. `keys: None` means the whole
/// area for `get` and `bytes_in_use`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<(), BackendError>;

    async fn get(
        &self,
        area: &str,
        keys: Option<&[String]>,
    ) -> Result<HashMap<String, Value>, BackendError>;

    async fn remove(&self, area: &str, keys: &[String]) -> Result<(), BackendError>;

    async fn clear(&self, area: &str) -> Result<(), BackendError>;

    async fn bytes_in_use(&self, area: &str, keys: Option<&[String]>)
    -> Result<u64, BackendError>;
}

/// In-memory storage areas with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    areas: Mutex<HashMap<String, HashMap<String, Value>>>,
    quota_bytes: Option<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `set` calls that would push an area past `quota_bytes`, with
    /// a quota-vocabulary message.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            areas: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, Value>>> {
        match self.areas.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Approximate stored size of one entry: key length plus the compact
/// JSON encoding of the value.
fn entry_bytes(key: &str, value: &Value) -> u64 {
    let value_len = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    (key.len() + value_len) as u64
}

fn area_bytes(area: &HashMap<String, Value>, keys: Option<&[String]>) -> u64 {
    match keys {
        None => area.iter().map(|(k, v)| entry_bytes(k, v)).sum(),
        Some(keys) => keys
            .iter()
            .filter_map(|k| area.get(k).map(|v| entry_bytes(k, v)))
            .sum(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<(), BackendError> {
        let mut areas = self.lock();
        let target = areas.entry(area.to_string()).or_default();
        if let Some(quota) = self.quota_bytes {
            let mut prospective = target.clone();
            for (key, value) in entries {
                prospective.insert(key.clone(), value.clone());
            }
            if area_bytes(&prospective, None) > quota {
                return Err(BackendError::new(format!(
                    "Quota exceeded: not enough storage space in area '{area}'"
                )));
            }
        }
        for (key, value) in entries {
            target.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn get(
        &self,
        area: &str,
        keys: Option<&[String]>,
    ) -> Result<HashMap<String, Value>, BackendError> {
        let areas = self.lock();
        let Some(target) = areas.get(area) else {
            return Ok(HashMap::new());
        };
        Ok(match keys {
            None => target.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|k| target.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
        })
    }

    async fn remove(&self, area: &str, keys: &[String]) -> Result<(), BackendError> {
        let mut areas = self.lock();
        if let Some(target) = areas.get_mut(area) {
            for key in keys {
                target.remove(key);
            }
        }
        Ok(())
    }

    async fn clear(&self, area: &str) -> Result<(), BackendError> {
        let mut areas = self.lock();
        if let Some(target) = areas.get_mut(area) {
            target.clear();
        }
        Ok(())
    }

    async fn bytes_in_use(
        &self,
        area: &str,
        keys: Option<&[String]>,
    ) -> Result<u64, BackendError> {
        let areas = self.lock();
        Ok(areas.get(area).map_or(0, |target| area_bytes(target, keys)))
    }
}
