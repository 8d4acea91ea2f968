//! Engine state shared by both concurrency variants
//!
//! `CacheCore` owns the entry store and the policy state and updates them
//! together in every method, so a caller holding `&mut CacheCore` never
//! observes one without the other. Loader calls and caller-driven
//! write-through store calls happen outside the core (see `ops`); the core
//! only issues load tickets and applies their outcome.
//!
//! Write-back flushes, retries of failed writes and flushes of evicted dirty
//! entries do call the store from inside the core, so in the synchronized
//! variant they run under the core lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::writer::{AsyncWriter, WriteJob};
use super::{CacheKey, CacheValue};
use crate::bridge::{Loader, Store};
use crate::config::{CacheConfig, StoreFailurePolicy, WriteStrategy};
use crate::entry::{Attributes, EntryView};
use crate::error::{CacheError, CacheResult, LoadError};
use crate::expiration::ExpirationController;
use crate::policy::ReplacementPolicy;
use crate::sink::{deliver, ErrorSink, Operation};
use crate::stats::{CacheStats, MetricsCollector};
use crate::store::EntryStore;
use crate::time::Clock;

/// Result of looking a key up
pub(crate) enum Lookup<K, V> {
    Hit(V),
    Miss,
    Load(LoadTicket<K, V>),
}

/// Permission to install the result of one load
///
/// Any write, removal or clear of the key in the meantime revokes the
/// ticket, and the load result is then discarded instead of resurrecting
/// stale data.
pub(crate) struct LoadTicket<K, V> {
    pub(crate) key: K,
    pub(crate) loader: Arc<dyn Loader<K, V>>,
    id: u64,
}

/// Everything a write needs from the core before touching the store
pub(crate) struct WritePlan<K, V> {
    pub(crate) store: Option<Arc<dyn Store<K, V>>>,
    pub(crate) strategy: WriteStrategy,
    pub(crate) on_failure: StoreFailurePolicy,
}

pub(crate) struct CacheCore<K, V, C> {
    config: CacheConfig,
    entries: EntryStore<K, V>,
    policy: Box<dyn ReplacementPolicy<K>>,
    expiration: ExpirationController,
    loader: Option<Arc<dyn Loader<K, V>>>,
    backing: Option<Arc<dyn Store<K, V>>>,
    writer: Option<AsyncWriter<K, V>>,
    sink: Arc<dyn ErrorSink>,
    metrics: MetricsCollector,
    clock: C,
    tickets: HashMap<K, u64>,
    next_ticket: u64,
    dirty: HashSet<K>,
    last_sweep: Instant,
}

impl<K, V, C> CacheCore<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    pub(crate) fn new(
        config: CacheConfig,
        policy: Box<dyn ReplacementPolicy<K>>,
        loader: Option<Arc<dyn Loader<K, V>>>,
        backing: Option<Arc<dyn Store<K, V>>>,
        sink: Arc<dyn ErrorSink>,
        clock: C,
    ) -> Self {
        let expiration = ExpirationController::new(config.default_ttl, config.expiration);
        let metrics = MetricsCollector::new(config.track_metrics);
        let last_sweep = clock.now();
        let writer = match (&backing, config.write_strategy) {
            (Some(store), WriteStrategy::WriteThroughAsync) => {
                Some(AsyncWriter::start(Arc::clone(store), Arc::clone(&sink), metrics.clone()))
            }
            _ => None,
        };
        Self {
            config,
            entries: EntryStore::new(),
            policy,
            expiration,
            loader,
            backing,
            writer,
            sink,
            metrics,
            clock,
            tickets: HashMap::new(),
            next_ticket: 0,
            dirty: HashSet::new(),
            last_sweep,
        }
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn expiration(&self) -> ExpirationController {
        self.expiration
    }

    pub(crate) fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Serve a hit, or report a miss and hand out a load ticket when a
    /// loader is attached
    pub(crate) fn lookup(&mut self, key: &K) -> CacheResult<Lookup<K, V>> {
        self.maybe_sweep();
        let now = self.clock.now();
        self.expire_if_due(key, now)?;

        if let Some(value) = self.entries.touch(key, now) {
            self.policy.touch(key)?;
            self.metrics.record_hit();
            self.retry_dirty(key);
            return Ok(Lookup::Hit(value));
        }

        self.metrics.record_miss();
        match &self.loader {
            Some(loader) => {
                let loader = Arc::clone(loader);
                self.next_ticket += 1;
                self.tickets.insert(key.clone(), self.next_ticket);
                Ok(Lookup::Load(LoadTicket { key: key.clone(), loader, id: self.next_ticket }))
            }
            None => Ok(Lookup::Miss),
        }
    }

    /// Apply the outcome of a load started by [`lookup`](Self::lookup)
    pub(crate) fn complete_load(
        &mut self,
        ticket: LoadTicket<K, V>,
        outcome: Result<Option<V>, LoadError>,
        attributes: &Attributes,
    ) -> CacheResult<Option<V>> {
        let LoadTicket { key, id, .. } = ticket;
        let current = self.tickets.get(&key) == Some(&id);
        if current {
            self.tickets.remove(&key);
        }

        match outcome {
            Err(source) => {
                self.metrics.record_load_failure();
                let err = CacheError::load_failure(&key, source);
                deliver(self.sink.as_ref(), Operation::Load, &err);
                Err(err)
            }
            Ok(None) => Ok(None),
            Ok(Some(value)) => {
                self.metrics.record_load();
                if current {
                    self.install(key, value.clone(), attributes, false)?;
                } else {
                    self.metrics.record_stale_load();
                    debug!(key = ?key, "discarding load result for a key modified during the load");
                }
                Ok(Some(value))
            }
        }
    }

    /// Live value without recording an access
    pub(crate) fn peek(&mut self, key: &K) -> CacheResult<Option<V>> {
        let now = self.clock.now();
        self.expire_if_due(key, now)?;
        Ok(self.entries.peek(key))
    }

    pub(crate) fn entry(&mut self, key: &K) -> CacheResult<Option<EntryView<V>>> {
        let now = self.clock.now();
        self.expire_if_due(key, now)?;
        Ok(self.entries.get(key))
    }

    pub(crate) fn contains_key(&mut self, key: &K) -> CacheResult<bool> {
        let now = self.clock.now();
        self.expire_if_due(key, now)?;
        Ok(self.entries.contains(key))
    }

    /// Record an access without reading the value
    pub(crate) fn touch(&mut self, key: &K) -> CacheResult<bool> {
        let now = self.clock.now();
        self.expire_if_due(key, now)?;
        if self.entries.touch(key, now).is_none() {
            return Ok(false);
        }
        self.policy.touch(key)?;
        Ok(true)
    }

    /// Live entries in insertion order
    pub(crate) fn snapshot(&self) -> Vec<(K, EntryView<V>)> {
        let now = self.clock.now();
        self.entries
            .snapshot()
            .into_iter()
            .filter(|(_, view)| !view.is_expired_at(now))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.metrics.snapshot(
            self.entries.len(),
            self.config.max_entries,
            self.entries.total_cost(),
            self.entries.total_size(),
        )
    }

    /// Running totals next to totals recomputed from every entry
    pub(crate) fn totals_consistent(&self) -> bool {
        let (cost, size) = self.entries.recomputed_totals();
        size == self.entries.total_size() && (cost - self.entries.total_cost()).abs() < 1e-6
    }

    pub(crate) fn policy_len(&self) -> usize {
        self.policy.len()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub(crate) fn write_plan(&self) -> WritePlan<K, V> {
        WritePlan {
            store: self.backing.clone(),
            strategy: self.config.write_strategy,
            on_failure: self.config.store_failure,
        }
    }

    /// Hand a store or delete call to the background writer, behind every
    /// write already queued
    pub(crate) fn persist_later(&self, job: WriteJob<K, V>) {
        if let Some(writer) = &self.writer {
            writer.submit(job);
        }
    }

    /// Insert or replace an entry, then evict until back under every limit
    ///
    /// `dirty` marks the value as not yet persisted.
    pub(crate) fn install(
        &mut self,
        key: K,
        value: V,
        attributes: &Attributes,
        dirty: bool,
    ) -> CacheResult<Option<V>> {
        attributes.validate()?;
        self.maybe_sweep();
        let now = self.clock.now();
        let weight = attributes.weight();
        let expires_at = self.expiration.deadline(now, attributes.ttl());

        self.tickets.remove(&key);
        let previous = self.entries.put(key.clone(), value, weight, expires_at, now);
        if previous.is_some() {
            self.policy.remove(&key)?;
        }
        self.policy.add(key.clone(), weight)?;
        self.metrics.record_insert();

        if dirty {
            self.dirty.insert(key);
        } else {
            self.dirty.remove(&key);
        }

        self.enforce_limits()?;

        if let WriteStrategy::WriteBack { max_pending } = self.config.write_strategy {
            if self.dirty.len() >= max_pending {
                // Failures are reported and the entries stay dirty.
                let _ = self.flush();
            }
        }

        Ok(previous.filter(|view| !view.is_expired_at(now)).map(|view| view.value))
    }

    pub(crate) fn remove(&mut self, key: &K) -> CacheResult<Option<V>> {
        let now = self.clock.now();
        self.tickets.remove(key);
        self.dirty.remove(key);
        let Some(view) = self.entries.remove(key) else {
            return Ok(None);
        };
        self.policy.remove(key)?;
        if view.is_expired_at(now) {
            self.metrics.record_expiration();
            return Ok(None);
        }
        self.metrics.record_removal();
        Ok(Some(view.value))
    }

    /// Drop every entry; pending write-back data is flushed first
    pub(crate) fn clear(&mut self) {
        if !self.dirty.is_empty() {
            let _ = self.flush();
        }
        self.entries.clear();
        self.policy.clear();
        self.tickets.clear();
        self.dirty.clear();
    }

    pub(crate) fn record_store_failure(&self, operation: Operation, err: &CacheError) {
        self.metrics.record_store_failure();
        deliver(self.sink.as_ref(), operation, err);
    }

    // ------------------------------------------------------------------
    // Eviction and expiration
    // ------------------------------------------------------------------

    /// Evict up to `count` policy-chosen entries
    pub(crate) fn evict(&mut self, count: usize) -> CacheResult<Vec<K>> {
        let mut victims = Vec::with_capacity(count.min(self.entries.len()));
        while victims.len() < count && !self.entries.is_empty() {
            let victim = self.policy.evict_next()?;
            self.discard(&victim, Operation::Evict);
            victims.push(victim);
        }
        Ok(victims)
    }

    /// Remove every expired entry now
    pub(crate) fn purge_expired(&mut self) -> CacheResult<usize> {
        let now = self.clock.now();
        self.last_sweep = now;
        let expired = self.entries.expired_keys(now);
        for key in &expired {
            self.policy.remove(key)?;
            self.discard(key, Operation::Expire);
        }
        Ok(expired.len())
    }

    /// Eager mode piggybacks a sweep on traffic once the interval elapsed
    fn maybe_sweep(&mut self) {
        let Some(interval) = self.expiration.sweep_interval() else {
            return;
        };
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_sweep) >= interval {
            if let Err(err) = self.purge_expired() {
                deliver(self.sink.as_ref(), Operation::Expire, &err);
            }
        }
    }

    fn over_limits(&self) -> bool {
        self.config.max_entries.is_some_and(|max| self.entries.len() > max)
            || self.config.max_total_cost.is_some_and(|max| self.entries.total_cost() > max)
            || self.config.max_total_size.is_some_and(|max| self.entries.total_size() > max)
    }

    fn enforce_limits(&mut self) -> CacheResult<()> {
        while self.over_limits() && !self.entries.is_empty() {
            let victim = self.policy.evict_next()?;
            self.discard(&victim, Operation::Evict);
        }
        Ok(())
    }

    fn expire_if_due(&mut self, key: &K, now: Instant) -> CacheResult<()> {
        if ExpirationController::is_expired(self.entries.expires_at(key), now) {
            self.policy.remove(key)?;
            self.discard(key, Operation::Expire);
        }
        Ok(())
    }

    /// Remove an entry the policy no longer tracks, flushing it first when
    /// it holds unpersisted data
    fn discard(&mut self, key: &K, reason: Operation) {
        if self.dirty.remove(key) {
            self.flush_one(key, reason);
        }
        self.tickets.remove(key);
        if self.entries.remove(key).is_some() {
            match reason {
                Operation::Expire => self.metrics.record_expiration(),
                _ => self.metrics.record_eviction(),
            }
            debug!(key = ?key, %reason, policy = self.policy.name(), "entry discarded");
        }
    }

    // ------------------------------------------------------------------
    // Persistence of dirty entries
    // ------------------------------------------------------------------

    fn flush_one(&mut self, key: &K, operation: Operation) {
        let (Some(store), Some(view)) = (self.backing.clone(), self.entries.get(key)) else {
            return;
        };
        let attributes = Attributes::new().with_cost(view.cost).with_size(view.size);
        if let Err(source) = store.store(key, &view.value, &attributes) {
            let err = CacheError::store_failure(key, source);
            self.record_store_failure(operation, &err);
        }
    }

    /// Retry a write that failed under `RetryOnNextAccess`
    fn retry_dirty(&mut self, key: &K) {
        let retrying = self.config.store_failure == StoreFailurePolicy::RetryOnNextAccess
            && !matches!(self.config.write_strategy, WriteStrategy::WriteBack { .. });
        if !retrying || !self.dirty.contains(key) {
            return;
        }
        let (Some(store), Some(view)) = (self.backing.clone(), self.entries.get(key)) else {
            return;
        };
        let attributes = Attributes::new().with_cost(view.cost).with_size(view.size);
        match store.store(key, &view.value, &attributes) {
            Ok(()) => {
                self.dirty.remove(key);
                debug!(key = ?key, "retried write persisted");
            }
            Err(source) => {
                let err = CacheError::store_failure(key, source);
                self.record_store_failure(Operation::Flush, &err);
            }
        }
    }

    /// Persist every dirty entry in one batch
    pub(crate) fn flush(&mut self) -> CacheResult<usize> {
        let Some(store) = self.backing.clone() else {
            self.dirty.clear();
            return Ok(0);
        };
        let batch: Vec<(K, V)> = self
            .dirty
            .iter()
            .filter_map(|key| self.entries.peek(key).map(|value| (key.clone(), value)))
            .collect();
        if batch.is_empty() {
            self.dirty.clear();
            return Ok(0);
        }

        match store.store_all(&batch) {
            Ok(()) => {
                self.dirty.clear();
                debug!(entries = batch.len(), "flushed dirty entries");
                Ok(batch.len())
            }
            Err(source) => {
                let err = CacheError::store_failure(&batch[0].0, source);
                self.record_store_failure(Operation::Flush, &err);
                Err(err)
            }
        }
    }

    pub(crate) fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Dirty write-back entries plus async writes still queued
    pub(crate) fn pending_writes(&self) -> usize {
        self.dirty.len() + self.writer.as_ref().map_or(0, AsyncWriter::backlog)
    }
}
