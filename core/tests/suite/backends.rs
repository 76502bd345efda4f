//! Instrumented test backends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use prefstore_core::{BackendError, MemoryBackend, StorageBackend};
use serde_json::Value;

/// One observed backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: &'static str,
    pub keys: Vec<String>,
    pub at: Instant,
}

/// Backend that records every call, can fail according to a script, and
/// can stretch each call so overlap would be observable.
///
/// Scripted failures are consumed in order by successive calls; once the
/// script runs out, calls fail with `always_fail` if set, otherwise
/// delegate to an in-memory backend.
#[derive(Default)]
pub struct ScriptedBackend {
    memory: MemoryBackend,
    script: Mutex<VecDeque<Option<String>>>,
    always_fail: Option<String>,
    call_delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next calls with these messages, in order, then succeed.
    pub fn with_failures<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        Self {
            script: Mutex::new(
                messages
                    .into_iter()
                    .map(|m| Some(m.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Fail every call with the same message.
    pub fn failing_with(message: &str) -> Self {
        Self {
            always_fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Stretch every call by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls ever simultaneously in flight.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn observe(&self, kind: &'static str, keys: Vec<String>) -> Result<(), BackendError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            kind,
            keys,
            at: Instant::now(),
        });

        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        let failure = {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(entry) => entry,
                None => self.always_fail.clone(),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageBackend for ScriptedBackend {
    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<(), BackendError> {
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        self.observe("set", keys).await?;
        self.memory.set(area, entries).await
    }

    async fn get(
        &self,
        area: &str,
        keys: Option<&[String]>,
    ) -> Result<HashMap<String, Value>, BackendError> {
        self.observe("get", keys.map(<[String]>::to_vec).unwrap_or_default())
            .await?;
        self.memory.get(area, keys).await
    }

    async fn remove(&self, area: &str, keys: &[String]) -> Result<(), BackendError> {
        self.observe("remove", keys.to_vec()).await?;
        self.memory.remove(area, keys).await
    }

    async fn clear(&self, area: &str) -> Result<(), BackendError> {
        self.observe("clear", Vec::new()).await?;
        self.memory.clear(area).await
    }

    async fn bytes_in_use(
        &self,
        area: &str,
        keys: Option<&[String]>,
    ) -> Result<u64, BackendError> {
        self.observe(
            "bytes_in_use",
            keys.map(<[String]>::to_vec).unwrap_or_default(),
        )
        .await?;
        self.memory.bytes_in_use(area, keys).await
    }
}

/// Single-entry `set` payload helper.
pub fn one_entry(key: &str, value: Value) -> HashMap<String, Value> {
    let mut entries = HashMap::new();
    entries.insert(key.to_string(), value);
    entries
}
