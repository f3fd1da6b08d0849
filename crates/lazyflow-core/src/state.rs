//! Per-run iteration state.
//!
//! A fresh `IterState` is created every time a sequence is consumed
//! (`Seq::iter` / `Seq::stream`) and handed by reference to every factory and
//! callback of that run. The engine never reads or writes it; user callbacks
//! own all keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

/// Open key/value scratch space shared by the callbacks of one pipeline run.
///
/// Cloning the handle shares the same map. The mutex only exists to make the
/// handle `Send + Sync`; pulls within a run are strictly sequential.
#[derive(Debug, Clone, Default)]
pub struct IterState {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl IterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Insert a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` with exclusive access to the underlying map.
    pub fn update<R>(&self, f: impl FnOnce(&mut HashMap<String, Value>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Read a numeric counter, treating a missing key as zero.
    pub fn counter(&self, key: &str) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    /// Add `by` to a numeric counter and return the new value.
    pub fn bump(&self, key: &str, by: i64) -> i64 {
        self.update(|map| {
            let next = map.get(key).and_then(|v| v.as_i64()).unwrap_or(0) + by;
            map.insert(key.to_string(), Value::from(next));
            next
        })
    }

    /// True when both handles point at the same run's map.
    pub fn same_run(&self, other: &IterState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        // A panicking callback must not wedge the rest of the run.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
