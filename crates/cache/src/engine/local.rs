//! Single-threaded cache variant

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use super::core::CacheCore;
use super::ops::{self, CoreAccess};
use super::{CacheApi, CacheBuilder, CacheKey, CacheLock, CacheValue, EntryLock};
use crate::capability::CapabilityDescriptor;
use crate::config::CacheConfig;
use crate::entry::{Attributes, EntryView};
use crate::error::{CacheError, CacheResult};
use crate::stats::CacheStats;
use crate::time::{Clock, SystemClock};

const VARIANT: &str = "LocalCache";

/// Cache without internal locking
///
/// `LocalCache` is `!Sync`: it cannot be shared between threads, and it
/// rejects the locking operations with
/// [`CacheError::UnsupportedOperation`]. Eager expiration piggybacks on
/// operations instead of running a background sweeper.
///
/// # Example
/// ```
/// use stowage_cache::{CacheApi, CacheConfig, LocalCache};
///
/// let cache: LocalCache<&str, i32> = LocalCache::new(CacheConfig::lru(2)).unwrap();
/// cache.put("a", 1).unwrap();
/// cache.put("b", 2).unwrap();
/// cache.put("c", 3).unwrap();
/// assert_eq!(cache.get(&"a").unwrap(), None);
/// assert!(cache.lock_entry(&"b").is_err());
/// ```
pub struct LocalCache<K, V, C = SystemClock> {
    core: RefCell<CacheCore<K, V, C>>,
}

impl<K, V> LocalCache<K, V, SystemClock>
where
    K: CacheKey,
    V: CacheValue,
{
    /// Create a cache from `config` with the system clock
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        CacheBuilder::new(config).build_local()
    }
}

impl<K, V, C> LocalCache<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    pub(crate) fn from_core(core: CacheCore<K, V, C>) -> Self {
        Self { core: RefCell::new(core) }
    }

    /// Configuration the cache was built with
    pub fn config(&self) -> CacheConfig {
        self.core.borrow().config().clone()
    }

    /// Writes not yet persisted: dirty write-back entries plus queued
    /// async writes
    pub fn pending_writes(&self) -> usize {
        self.core.borrow().pending_writes()
    }

    /// Check that the policy tracks exactly the stored keys and that the
    /// running totals match the entries
    pub fn is_consistent(&self) -> bool {
        let core = self.core.borrow();
        core.policy_len() == core.len() && core.totals_consistent()
    }
}

impl<K, V, C> CoreAccess<K, V, C> for LocalCache<K, V, C> {
    fn with_core<R>(&self, f: impl FnOnce(&mut CacheCore<K, V, C>) -> R) -> R {
        f(&mut self.core.borrow_mut())
    }
}

impl<K, V, C> CacheApi<K, V> for LocalCache<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::full().without_locks()
    }

    fn get(&self, key: &K) -> CacheResult<Option<V>> {
        ops::get(self, key)
    }

    fn get_all(&self, keys: &[K]) -> CacheResult<HashMap<K, V>> {
        ops::get_all(self, keys)
    }

    fn put_with(&self, key: K, value: V, attributes: Attributes) -> CacheResult<Option<V>> {
        ops::put(self, key, value, attributes)
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        ops::put_if_absent(self, key, value, Attributes::new())
    }

    fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        ops::remove(self, key)
    }

    fn clear(&self) {
        self.with_core(|core| core.clear());
    }

    fn evict(&self, count: usize) -> CacheResult<Vec<K>> {
        self.with_core(|core| core.evict(count))
    }

    fn touch(&self, key: &K) -> CacheResult<bool> {
        self.with_core(|core| core.touch(key))
    }

    fn entry(&self, key: &K) -> CacheResult<Option<EntryView<V>>> {
        self.with_core(|core| core.entry(key))
    }

    fn contains_key(&self, key: &K) -> CacheResult<bool> {
        self.with_core(|core| core.contains_key(key))
    }

    fn snapshot(&self) -> Vec<(K, EntryView<V>)> {
        self.core.borrow().snapshot()
    }

    fn len(&self) -> usize {
        self.core.borrow().len()
    }

    fn purge_expired(&self) -> CacheResult<usize> {
        self.with_core(|core| core.purge_expired())
    }

    fn flush(&self) -> CacheResult<usize> {
        self.with_core(|core| core.flush())
    }

    fn stats(&self) -> CacheStats {
        self.core.borrow().stats()
    }

    fn lock_entry(&self, _key: &K) -> CacheResult<EntryLock<'_>> {
        Err(CacheError::unsupported("lock_entry", VARIANT))
    }

    fn lock_all(&self) -> CacheResult<CacheLock<'_>> {
        Err(CacheError::unsupported("lock_all", VARIANT))
    }
}

impl<K, V, C> fmt::Debug for LocalCache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the unsynchronized variant.
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::bridge::FnLoader;
    use crate::config::{EvictionPolicy, ExpirationMode};
    use crate::error::LoadError;
    use crate::time::MockClock;

    fn local(config: CacheConfig) -> (LocalCache<String, i32, MockClock>, MockClock) {
        let clock = MockClock::new();
        let cache = CacheBuilder::new(config).clock(clock.clone()).build_local().unwrap();
        (cache, clock)
    }

    /// Validates `LocalCache::put` behavior for the replace scenario.
    ///
    /// Assertions:
    /// - Confirms the second put returns the first value.
    /// - Confirms `cache.len()` equals `1`.
    #[test]
    fn test_put_replaces_and_returns_previous() {
        let (cache, _) = local(CacheConfig::lru(10));
        assert_eq!(cache.put("k".into(), 1).unwrap(), None);
        assert_eq!(cache.put("k".into(), 2).unwrap(), Some(1));
        assert_eq!(cache.get(&"k".into()).unwrap(), Some(2));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_lru_eviction_order() {
        let (cache, _) = local(CacheConfig::lru(3));
        for key in ["A", "B", "C"] {
            cache.put(key.into(), 0).unwrap();
        }
        cache.get(&"A".into()).unwrap();
        cache.put("D".into(), 0).unwrap();

        let keys: Vec<String> = cache.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "C", "D"]);
        assert_eq!(cache.stats().evictions, 1);
    }

    /// Validates the TTL boundary scenario.
    ///
    /// Assertions:
    /// - Confirms the entry is visible one millisecond before its deadline.
    /// - Confirms it is gone exactly at the deadline.
    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let (cache, clock) = local(CacheConfig::ttl(Duration::from_millis(100)));
        cache.put("k".into(), 1).unwrap();

        clock.advance_millis(99);
        assert_eq!(cache.get(&"k".into()).unwrap(), Some(1));
        clock.advance_millis(1);
        assert_eq!(cache.get(&"k".into()).unwrap(), None);
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_eager_mode_sweeps_on_traffic() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_millis(10))
            .expiration(ExpirationMode::Eager { interval: Duration::from_millis(50) })
            .build();
        let (cache, clock) = local(config);
        cache.put("a".into(), 1).unwrap();
        cache.put("b".into(), 2).unwrap();

        clock.advance_millis(60);
        cache.put("c".into(), 3).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_loader_fills_misses_and_failures_leave_key_absent() {
        let loader = FnLoader::new(|key: &String, _: &mut Attributes| match key.as_str() {
            "bad" => Err(LoadError::Unavailable("offline".into())),
            "none" => Ok(None),
            other => Ok(Some(other.len() as i32)),
        });
        let cache: LocalCache<String, i32> =
            CacheBuilder::new(CacheConfig::lru(10)).loader(loader).build_local().unwrap();

        assert_eq!(cache.get(&"four".into()).unwrap(), Some(4));
        assert!(cache.contains_key(&"four".into()).unwrap());
        assert_eq!(cache.get(&"none".into()).unwrap(), None);
        assert!(matches!(cache.get(&"bad".into()), Err(CacheError::LoadFailure { .. })));
        assert!(!cache.contains_key(&"bad".into()).unwrap());

        let stats = cache.stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.load_failures, 1);
    }

    #[test]
    fn test_locks_are_unsupported() {
        let (cache, _) = local(CacheConfig::default());
        assert!(cache.lock_entry(&"k".into()).unwrap_err().is_unsupported());
        assert!(cache.lock_all().unwrap_err().is_unsupported());
        assert!(!cache.capabilities().entry_lock_support);
    }

    #[test]
    fn test_landlord_respects_total_size() {
        let config = CacheConfig::builder()
            .eviction_policy(EvictionPolicy::Landlord)
            .max_total_size(10)
            .build();
        let (cache, _) = local(config);
        cache.put_with("big".into(), 1, Attributes::new().with_size(6).with_cost(1.0)).unwrap();
        cache.put_with("small".into(), 2, Attributes::new().with_size(2).with_cost(8.0)).unwrap();
        cache.put_with("mid".into(), 3, Attributes::new().with_size(4).with_cost(4.0)).unwrap();

        assert!(cache.stats().total_size <= 10);
        assert!(!cache.contains_key(&"big".into()).unwrap());
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_shared_loader_handle() {
        let loader: Arc<dyn crate::bridge::Loader<String, i32>> =
            Arc::new(FnLoader::new(|_: &String, _: &mut Attributes| Ok(Some(7))));
        let cache: LocalCache<String, i32> =
            CacheBuilder::new(CacheConfig::default()).shared_loader(loader).build_local().unwrap();
        assert_eq!(cache.get(&"x".into()).unwrap(), Some(7));
    }
}
