//! Recording loader and store used by the bundles
//!
//! Both fixtures are `Send + Sync`, keep a log of every call and can be
//! switched into a failing mode, so checks can assert exactly what the
//! cache asked of its collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use stowage_cache::{Attributes, LoadError, Loader, Store, StoreError};

/// Loader backed by an in-memory table
#[derive(Debug, Default)]
pub struct RecordingLoader {
    values: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    cost: Mutex<Option<f64>>,
}

impl RecordingLoader {
    /// Empty loader; every key loads as absent
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that knows the given entries
    pub fn with_values<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let loader = Self::new();
        for (key, value) in entries {
            loader.set(key, value);
        }
        loader
    }

    /// Make `key` load as `value`
    pub fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_owned(), value.to_owned());
    }

    /// Make loads of `key` fail until [`recover`](Self::recover) is called
    pub fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_owned());
    }

    /// Stop failing loads of `key`
    pub fn recover(&self, key: &str) {
        self.failing.lock().remove(key);
    }

    /// Sleep this long inside every load
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Annotate every loaded entry with `cost`
    pub fn set_cost(&self, cost: f64) {
        *self.cost.lock() = Some(cost);
    }

    /// Every key loaded so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of loads of `key`
    pub fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|called| called.as_str() == key).count()
    }
}

impl Loader<String, String> for RecordingLoader {
    fn load(&self, key: &String, attributes: &mut Attributes) -> Result<Option<String>, LoadError> {
        self.calls.lock().push(key.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.failing.lock().contains(key) {
            return Err(LoadError::Unavailable(format!("no source for {key}")));
        }
        if let Some(cost) = *self.cost.lock() {
            attributes.set_cost(cost);
        }
        Ok(self.values.lock().get(key).cloned())
    }
}

/// A call observed by [`RecordingStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// Single-entry write
    Store(String),
    /// Batched write of these keys
    StoreAll(Vec<String>),
    /// Single-entry delete
    Delete(String),
}

/// In-memory store that records every call
#[derive(Debug, Default)]
pub struct RecordingStore {
    data: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: AtomicBool,
    rejected: AtomicUsize,
}

impl RecordingStore {
    /// Empty, healthy store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure of every subsequent call
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Persisted value for `key`
    pub fn value(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// Number of persisted keys
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// True when nothing is persisted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of calls refused while failing
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

impl Store<String, String> for RecordingStore {
    fn store(&self, key: &String, value: &String, _: &Attributes) -> Result<(), StoreError> {
        self.check()?;
        self.calls.lock().push(StoreCall::Store(key.clone()));
        self.data.lock().insert(key.clone(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &String) -> Result<(), StoreError> {
        self.check()?;
        self.calls.lock().push(StoreCall::Delete(key.clone()));
        self.data.lock().remove(key);
        Ok(())
    }

    fn store_all(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        self.check()?;
        let keys = entries.iter().map(|(key, _)| key.clone()).collect();
        self.calls.lock().push(StoreCall::StoreAll(keys));
        self.data.lock().extend(entries.iter().cloned());
        Ok(())
    }
}
