//! Cache engine and its concurrency variants
//!
//! Both variants run the same engine logic over a [`CacheCore`]; they
//! differ only in how access to it is serialized.
//!
//! | Variant        | Thread-safe | Entry locks | Wide lock | Async loads |
//! |----------------|-------------|-------------|-----------|-------------|
//! | [`LocalCache`] | no          | no          | no        | no          |
//! | [`Cache`]      | yes         | yes         | yes       | yes         |
//!
//! [`CacheApi`] is the object-safe surface shared by both, used by the
//! conformance suite and by [`CacheBuilder::build_boxed`].

mod builder;
pub(crate) mod core;
mod local;
mod ops;
mod shared;
mod writer;

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

pub use builder::CacheBuilder;
pub use local::LocalCache;
pub use shared::{Cache, CacheLock, EntryLock, PendingLoad};

use crate::capability::CapabilityDescriptor;
use crate::entry::{Attributes, EntryView};
use crate::error::CacheResult;
use crate::health::CacheHealthReport;
use crate::stats::CacheStats;

/// Bounds every cache key satisfies
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Send + 'static {}

/// Bounds every cache value satisfies
pub trait CacheValue: Clone + Send + 'static {}

impl<T> CacheValue for T where T: Clone + Send + 'static {}

/// Operations common to every cache variant
pub trait CacheApi<K, V> {
    /// Declared optional features
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Value for `key`, loading it on a miss when a loader is attached
    fn get(&self, key: &K) -> CacheResult<Option<V>>;

    /// Values for every key that is present or loadable
    fn get_all(&self, keys: &[K]) -> CacheResult<HashMap<K, V>>;

    /// Insert or replace with default attributes, returning the old value
    fn put(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.put_with(key, value, Attributes::new())
    }

    /// Insert or replace with explicit cost, size or TTL
    fn put_with(&self, key: K, value: V, attributes: Attributes) -> CacheResult<Option<V>>;

    /// Insert only when absent; returns the existing value otherwise
    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>>;

    /// Remove `key`, returning its live value
    fn remove(&self, key: &K) -> CacheResult<Option<V>>;

    /// Drop every entry
    fn clear(&self);

    /// Evict up to `count` entries chosen by the replacement policy
    fn evict(&self, count: usize) -> CacheResult<Vec<K>>;

    /// Record an access without reading the value
    fn touch(&self, key: &K) -> CacheResult<bool>;

    /// Entry view with bookkeeping attributes
    fn entry(&self, key: &K) -> CacheResult<Option<EntryView<V>>>;

    /// Check if a live entry exists, without loading
    fn contains_key(&self, key: &K) -> CacheResult<bool>;

    /// Live entries in insertion order
    fn snapshot(&self) -> Vec<(K, EntryView<V>)>;

    /// Number of stored entries
    fn len(&self) -> usize;

    /// Check if the cache holds no entry
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry now
    fn purge_expired(&self) -> CacheResult<usize>;

    /// Persist pending write-back data
    fn flush(&self) -> CacheResult<usize>;

    /// Current statistics
    fn stats(&self) -> CacheStats;

    /// Health status derived from [`stats`](Self::stats)
    fn health(&self) -> CacheHealthReport {
        CacheHealthReport::from_stats(self.stats())
    }

    /// Exclusive lock over one key
    fn lock_entry(&self, key: &K) -> CacheResult<EntryLock<'_>>;

    /// Exclusive lock over the whole cache
    fn lock_all(&self) -> CacheResult<CacheLock<'_>>;
}
