//! Thread-safe cache variant
//!
//! Lock order is fixed: key stripes first (ascending index when several are
//! taken), then the core mutex. No stripe is ever requested while the core
//! mutex is held.
//!
//! The core mutex is never held across a loader call or a caller's
//! write-through store call. Write-back flushes (including those run by the
//! sweeper), retries of failed writes and flushes of evicted dirty entries
//! call the store while it is held, so a slow store stalls every key for
//! their duration.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, info, warn};

use super::core::{CacheCore, LoadTicket, Lookup};
use super::ops::{self, CoreAccess};
use super::{CacheApi, CacheBuilder, CacheKey, CacheValue};
use crate::capability::CapabilityDescriptor;
use crate::config::{CacheConfig, LockGranularity};
use crate::entry::{Attributes, EntryView};
use crate::error::{CacheResult, LoadError};
use crate::stats::CacheStats;
use crate::time::{Clock, SystemClock};

/// Exclusive lock over one key, released on drop
///
/// The holding thread may keep using the cache, including on the locked
/// key; other threads block on any operation that touches the key's stripe.
#[must_use = "the entry is unlocked as soon as the guard is dropped"]
pub struct EntryLock<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// Exclusive lock over the whole cache, released on drop
#[must_use = "the cache is unlocked as soon as the guard is dropped"]
pub struct CacheLock<'a> {
    _guards: Vec<ReentrantMutexGuard<'a, ()>>,
}

impl fmt::Debug for EntryLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntryLock")
    }
}

impl fmt::Debug for CacheLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLock").field("stripes", &self._guards.len()).finish()
    }
}

/// Result slot of one in-flight background load
struct LoadSlot<V> {
    result: Mutex<Option<CacheResult<Option<V>>>>,
    ready: Condvar,
}

impl<V: Clone> LoadSlot<V> {
    fn empty() -> Self {
        Self { result: Mutex::new(None), ready: Condvar::new() }
    }

    fn filled(result: CacheResult<Option<V>>) -> Self {
        Self { result: Mutex::new(Some(result)), ready: Condvar::new() }
    }

    fn fulfil(&self, result: CacheResult<Option<V>>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> CacheResult<Option<V>> {
        let mut result = self.result.lock();
        loop {
            if let Some(done) = result.as_ref() {
                return done.clone();
            }
            self.ready.wait(&mut result);
        }
    }

    fn wait_for(&self, timeout: Duration) -> Option<CacheResult<Option<V>>> {
        let mut result = self.result.lock();
        if result.is_none() {
            self.ready.wait_for(&mut result, timeout);
        }
        result.clone()
    }
}

/// Handle to a load running on a background thread
///
/// Every handle for the same in-flight key shares one load.
pub struct PendingLoad<V> {
    slot: Arc<LoadSlot<V>>,
}

impl<V: Clone> PendingLoad<V> {
    fn ready(result: CacheResult<Option<V>>) -> Self {
        Self { slot: Arc::new(LoadSlot::filled(result)) }
    }

    /// Block until the load finishes
    pub fn wait(&self) -> CacheResult<Option<V>> {
        self.slot.wait()
    }

    /// Block for at most `timeout`; `None` if the load is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CacheResult<Option<V>>> {
        self.slot.wait_for(timeout)
    }

    /// Check if the result is available
    pub fn is_ready(&self) -> bool {
        self.slot.result.lock().is_some()
    }
}

impl<V> fmt::Debug for PendingLoad<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad").finish_non_exhaustive()
    }
}

/// Wakes and stops the expiration sweeper
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    /// Sleep up to `timeout`; true once stopped
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.wake.wait_for(&mut stopped, timeout);
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

struct Shared<K, V, C> {
    core: Mutex<CacheCore<K, V, C>>,
    stripes: Box<[ReentrantMutex<()>]>,
    hasher: RandomState,
    inflight: Mutex<HashMap<K, Arc<LoadSlot<V>>>>,
    granularity: LockGranularity,
    sweeper: Option<Arc<StopSignal>>,
}

impl<K, V, C> CoreAccess<K, V, C> for Shared<K, V, C> {
    fn with_core<R>(&self, f: impl FnOnce(&mut CacheCore<K, V, C>) -> R) -> R {
        f(&mut self.core.lock())
    }
}

impl<K, V, C> Shared<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    fn stripe(&self, key: &K) -> &ReentrantMutex<()> {
        let index = (self.hasher.hash_one(key) as usize) % self.stripes.len();
        &self.stripes[index]
    }

    fn inflight(&self, key: &K) -> Option<Arc<LoadSlot<V>>> {
        self.inflight.lock().get(key).cloned()
    }

    /// Forget the in-flight load for `key`; its result is already stale
    fn forget_inflight(&self, key: &K) {
        self.inflight.lock().remove(key);
    }

    /// Run a ticketed load with loader panics turned into load failures
    fn finish_load(&self, ticket: LoadTicket<K, V>) -> CacheResult<Option<V>> {
        let mut attributes = Attributes::new();
        let load = || ticket.loader.load(&ticket.key, &mut attributes);
        let outcome = catch_unwind(AssertUnwindSafe(load))
            .unwrap_or_else(|_| Err(LoadError::other("loader panicked")));
        self.with_core(|core| core.complete_load(ticket, outcome, &attributes))
    }

    fn sweep(&self) {
        let mut core = self.core.lock();
        match core.purge_expired() {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "expiration sweep removed entries"),
            Err(err) => warn!(error = %err, "expiration sweep failed"),
        }
        if core.dirty_len() > 0 {
            // Flush failures are reported through the sink by the core.
            let _ = core.flush();
        }
    }
}

impl<K, V, C> Drop for Shared<K, V, C> {
    fn drop(&mut self) {
        if let Some(signal) = &self.sweeper {
            signal.stop();
        }
    }
}

/// Thread-safe cache with striped or wide locking
///
/// Clones share the same entries. Operations on one key are serialized by
/// the key's stripe, so concurrent misses on a key trigger at most one
/// load; operations on keys in different stripes only contend on the brief
/// core critical section.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use stowage_cache::{Cache, CacheApi, CacheConfig};
///
/// let cache: Cache<String, i32> =
///     Cache::new(CacheConfig::ttl_lru(Duration::from_secs(300), 1000)).unwrap();
/// cache.put("key".to_string(), 42).unwrap();
/// assert_eq!(cache.get(&"key".to_string()).unwrap(), Some(42));
///
/// let _guard = cache.lock_entry(&"key".to_string()).unwrap();
/// ```
pub struct Cache<K, V, C = SystemClock> {
    inner: Arc<Shared<K, V, C>>,
}

impl<K, V> Cache<K, V, SystemClock>
where
    K: CacheKey,
    V: CacheValue,
{
    /// Create a cache from `config` with the system clock
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        CacheBuilder::new(config).build()
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    /// Create a cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> CacheResult<Self> {
        CacheBuilder::new(config).clock(clock).build()
    }

    pub(crate) fn from_core(core: CacheCore<K, V, C>, granularity: LockGranularity) -> Self {
        let stripes =
            (0..granularity.stripe_count().max(1)).map(|_| ReentrantMutex::new(())).collect();
        let interval = core.expiration().sweep_interval();
        let signal = interval.map(|_| Arc::new(StopSignal::default()));

        let inner = Arc::new(Shared {
            core: Mutex::new(core),
            stripes,
            hasher: RandomState::new(),
            inflight: Mutex::new(HashMap::new()),
            granularity,
            sweeper: signal.clone(),
        });

        if let (Some(interval), Some(signal)) = (interval, signal) {
            spawn_sweeper(Arc::downgrade(&inner), signal, interval);
        }
        Self { inner }
    }

    /// Load `key` on a background thread
    ///
    /// Hits resolve immediately. Concurrent requests for the same missing
    /// key share one load, and a write or removal of the key while the load
    /// runs keeps the loaded value out of the cache.
    pub fn get_async(&self, key: &K) -> PendingLoad<V> {
        let _stripe = self.inner.stripe(key).lock();
        if let Some(slot) = self.inner.inflight(key) {
            return PendingLoad { slot };
        }

        let ticket = match self.inner.with_core(|core| core.lookup(key)) {
            Ok(Lookup::Hit(value)) => return PendingLoad::ready(Ok(Some(value))),
            Ok(Lookup::Miss) => return PendingLoad::ready(Ok(None)),
            Ok(Lookup::Load(ticket)) => ticket,
            Err(err) => return PendingLoad::ready(Err(err)),
        };

        let slot = Arc::new(LoadSlot::empty());
        self.inner.inflight.lock().insert(key.clone(), Arc::clone(&slot));

        let shared = Arc::clone(&self.inner);
        let worker_slot = Arc::clone(&slot);
        let key = key.clone();
        ops::spawn_or_run("stowage-load", move || {
            let result = shared.finish_load(ticket);
            {
                let mut inflight = shared.inflight.lock();
                if inflight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &worker_slot)) {
                    inflight.remove(&key);
                }
            }
            worker_slot.fulfil(result);
        });

        PendingLoad { slot }
    }

    /// Configuration the cache was built with
    pub fn config(&self) -> CacheConfig {
        self.inner.core.lock().config().clone()
    }

    /// Lock layout in use
    pub fn granularity(&self) -> LockGranularity {
        self.inner.granularity
    }

    /// Writes not yet persisted: dirty write-back entries plus queued
    /// async writes
    pub fn pending_writes(&self) -> usize {
        self.inner.core.lock().pending_writes()
    }

    /// Check that the policy tracks exactly the stored keys and that the
    /// running totals match the entries
    pub fn is_consistent(&self) -> bool {
        let core = self.inner.core.lock();
        core.policy_len() == core.len() && core.totals_consistent()
    }

    fn lock_stripes(&self) -> Vec<ReentrantMutexGuard<'_, ()>> {
        self.inner.stripes.iter().map(ReentrantMutex::lock).collect()
    }
}

impl<K, V, C> CacheApi<K, V> for Cache<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::full()
    }

    fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let _stripe = self.inner.stripe(key).lock();
        if let Some(slot) = self.inner.inflight(key) {
            return slot.wait();
        }
        ops::get(self.inner.as_ref(), key)
    }

    fn get_all(&self, keys: &[K]) -> CacheResult<HashMap<K, V>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn put_with(&self, key: K, value: V, attributes: Attributes) -> CacheResult<Option<V>> {
        let _stripe = self.inner.stripe(&key).lock();
        self.inner.forget_inflight(&key);
        ops::put(self.inner.as_ref(), key, value, attributes)
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        let _stripe = self.inner.stripe(&key).lock();
        ops::put_if_absent(self.inner.as_ref(), key, value, Attributes::new())
    }

    fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let _stripe = self.inner.stripe(key).lock();
        self.inner.forget_inflight(key);
        ops::remove(self.inner.as_ref(), key)
    }

    fn clear(&self) {
        let _stripes = self.lock_stripes();
        self.inner.inflight.lock().clear();
        self.inner.with_core(|core| core.clear());
    }

    fn evict(&self, count: usize) -> CacheResult<Vec<K>> {
        self.inner.with_core(|core| core.evict(count))
    }

    fn touch(&self, key: &K) -> CacheResult<bool> {
        let _stripe = self.inner.stripe(key).lock();
        self.inner.with_core(|core| core.touch(key))
    }

    fn entry(&self, key: &K) -> CacheResult<Option<EntryView<V>>> {
        let _stripe = self.inner.stripe(key).lock();
        self.inner.with_core(|core| core.entry(key))
    }

    fn contains_key(&self, key: &K) -> CacheResult<bool> {
        let _stripe = self.inner.stripe(key).lock();
        self.inner.with_core(|core| core.contains_key(key))
    }

    fn snapshot(&self) -> Vec<(K, EntryView<V>)> {
        self.inner.core.lock().snapshot()
    }

    fn len(&self) -> usize {
        self.inner.core.lock().len()
    }

    fn purge_expired(&self) -> CacheResult<usize> {
        self.inner.with_core(|core| core.purge_expired())
    }

    fn flush(&self) -> CacheResult<usize> {
        self.inner.with_core(|core| core.flush())
    }

    fn stats(&self) -> CacheStats {
        self.inner.core.lock().stats()
    }

    fn lock_entry(&self, key: &K) -> CacheResult<EntryLock<'_>> {
        Ok(EntryLock { _guard: self.inner.stripe(key).lock() })
    }

    fn lock_all(&self) -> CacheResult<CacheLock<'_>> {
        Ok(CacheLock { _guards: self.lock_stripes() })
    }
}

impl<K, V, C> Clone for Cache<K, V, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V, C> fmt::Debug for Cache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("granularity", &self.inner.granularity)
            .finish_non_exhaustive()
    }
}

fn spawn_sweeper<K, V, C>(
    shared: Weak<Shared<K, V, C>>,
    signal: Arc<StopSignal>,
    interval: Duration,
)
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    let sweeper_signal = Arc::clone(&signal);
    let spawned = thread::Builder::new().name("stowage-sweeper".into()).spawn(move || {
        info!(interval_ms = interval.as_millis() as u64, "expiration sweeper started");
        while !sweeper_signal.wait(interval) {
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.sweep();
        }
        info!("expiration sweeper stopped");
    });

    if let Err(err) = spawned {
        // Expired entries are still dropped on access and on traffic sweeps.
        signal.stop();
        warn!(error = %err, "could not start expiration sweeper");
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the synchronized variant.
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    use super::*;
    use crate::bridge::FnLoader;
    use crate::config::{Concurrency, ExpirationMode};
    use crate::error::CacheError;
    use crate::time::MockClock;

    /// Validates `Cache::get` behavior for the concurrent miss scenario.
    ///
    /// Assertions:
    /// - Confirms every thread observes the loaded value.
    /// - Confirms the loader ran exactly once.
    #[test]
    fn test_concurrent_misses_load_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = FnLoader::new(move |key: &u32, _: &mut Attributes| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(Some(key * 10))
        });
        let cache: Cache<u32, u32> =
            CacheBuilder::new(CacheConfig::lru(16)).loader(loader).build().unwrap();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&7).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(70));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_async_coalesces_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = FnLoader::new(move |key: &u32, _: &mut Attributes| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            Ok(Some(key + 1))
        });
        let cache: Cache<u32, u32> =
            CacheBuilder::new(CacheConfig::default()).loader(loader).build().unwrap();

        let first = cache.get_async(&1);
        let second = cache.get_async(&1);
        assert_eq!(first.wait().unwrap(), Some(2));
        assert_eq!(second.wait().unwrap(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let hit = cache.get_async(&1);
        assert!(hit.is_ready());
        assert_eq!(hit.wait().unwrap(), Some(2));
    }

    /// Validates the stale load scenario.
    ///
    /// Assertions:
    /// - Confirms a put during the load wins over the loaded value.
    /// - Confirms the discarded result is counted as stale.
    #[test]
    fn test_put_during_async_load_discards_result() {
        let gate = Arc::new(Barrier::new(2));
        let loader_gate = Arc::clone(&gate);
        let loader = FnLoader::new(move |_: &u32, _: &mut Attributes| {
            loader_gate.wait();
            Ok(Some(1))
        });
        let cache: Cache<u32, u32> =
            CacheBuilder::new(CacheConfig::default()).loader(loader).build().unwrap();

        let pending = cache.get_async(&5);
        cache.put(5, 99).unwrap();
        gate.wait();

        assert_eq!(pending.wait().unwrap(), Some(1));
        assert_eq!(cache.get(&5).unwrap(), Some(99));
        assert_eq!(cache.stats().stale_loads, 1);
    }

    #[test]
    fn test_loader_panic_becomes_load_failure() {
        let loader = FnLoader::new(|_: &u32, _: &mut Attributes| -> Result<Option<u32>, LoadError> {
            panic!("loader bug")
        });
        let cache: Cache<u32, u32> =
            CacheBuilder::new(CacheConfig::default()).loader(loader).build().unwrap();

        let result = cache.get_async(&1).wait();
        assert!(matches!(result, Err(CacheError::LoadFailure { .. })));
        assert!(!cache.contains_key(&1).unwrap());
    }

    #[test]
    fn test_entry_lock_is_reentrant_for_holder() {
        let cache: Cache<u32, u32> = Cache::new(CacheConfig::default()).unwrap();
        let _guard = cache.lock_entry(&1).unwrap();
        cache.put(1, 10).unwrap();
        assert_eq!(cache.get(&1).unwrap(), Some(10));

        let _all = cache.lock_all().unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_lock_excludes_other_threads() {
        let cache: Cache<u32, u32> = Cache::new(CacheConfig::default()).unwrap();
        let guard = cache.lock_entry(&3).unwrap();

        let writer = {
            let cache = cache.clone();
            thread::spawn(move || cache.put(3, 30).unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get(&3).unwrap(), None);

        drop(guard);
        writer.join().unwrap();
        assert_eq!(cache.get(&3).unwrap(), Some(30));
    }

    #[test]
    fn test_wide_granularity_uses_single_stripe() {
        let config = CacheConfig::builder()
            .concurrency(Concurrency::Synchronized(LockGranularity::Wide))
            .build();
        let cache: Cache<u32, u32> = Cache::new(config).unwrap();
        assert_eq!(cache.granularity(), LockGranularity::Wide);
        assert_eq!(cache.inner.stripes.len(), 1);
    }

    #[test]
    fn test_sweeper_purges_without_traffic() {
        let clock = MockClock::new();
        let config = CacheConfig::builder()
            .ttl(Duration::from_millis(10))
            .expiration(ExpirationMode::Eager { interval: Duration::from_millis(20) })
            .build();
        let cache: Cache<u32, u32, MockClock> = Cache::with_clock(config, clock.clone()).unwrap();
        cache.put(1, 1).unwrap();
        clock.advance_millis(50);

        let mut waited = Duration::ZERO;
        while cache.len() > 0 && waited < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(10));
            waited += Duration::from_millis(10);
        }
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }
}
