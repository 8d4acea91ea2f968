//! Assembles a cache from configuration and collaborators

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::core::CacheCore;
use super::{Cache, CacheApi, CacheKey, CacheValue, LocalCache};
use crate::bridge::{Loader, Store};
use crate::config::{CacheConfig, Concurrency, LockGranularity};
use crate::error::CacheResult;
use crate::policy::{self, ReplacementPolicy};
use crate::sink::{ErrorSink, TracingErrorSink};
use crate::time::{Clock, SystemClock};

/// Builder wiring a [`CacheConfig`] to its collaborators
///
/// # Example
/// ```
/// use stowage_cache::bridge::FnLoader;
/// use stowage_cache::{Attributes, CacheApi, CacheBuilder, CacheConfig};
///
/// let cache = CacheBuilder::new(CacheConfig::lru(100))
///     .loader(FnLoader::new(|key: &u64, _: &mut Attributes| Ok(Some(key * key))))
///     .build()
///     .unwrap();
/// assert_eq!(cache.get(&12).unwrap(), Some(144));
/// ```
pub struct CacheBuilder<K, V, C = SystemClock> {
    config: CacheConfig,
    clock: C,
    loader: Option<Arc<dyn Loader<K, V>>>,
    store: Option<Arc<dyn Store<K, V>>>,
    policy: Option<Box<dyn ReplacementPolicy<K>>>,
    sink: Arc<dyn ErrorSink>,
}

impl<K, V> CacheBuilder<K, V, SystemClock>
where
    K: CacheKey,
    V: CacheValue,
{
    /// Start from `config` with the system clock and the tracing error sink
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: SystemClock,
            loader: None,
            store: None,
            policy: None,
            sink: Arc::new(TracingErrorSink),
        }
    }
}

impl<K, V, C> CacheBuilder<K, V, C>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
{
    /// Replace the clock (use [`MockClock`](crate::MockClock) in tests)
    pub fn clock<C2: Clock>(self, clock: C2) -> CacheBuilder<K, V, C2> {
        CacheBuilder {
            config: self.config,
            clock,
            loader: self.loader,
            store: self.store,
            policy: self.policy,
            sink: self.sink,
        }
    }

    /// Attach a loader for miss-triggered loading
    pub fn loader(self, loader: impl Loader<K, V> + 'static) -> Self {
        self.shared_loader(Arc::new(loader))
    }

    /// Attach a loader that is shared with other owners
    pub fn shared_loader(mut self, loader: Arc<dyn Loader<K, V>>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Attach a store for write persistence
    pub fn store(self, store: impl Store<K, V> + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Attach a store that is shared with other owners
    pub fn shared_store(mut self, store: Arc<dyn Store<K, V>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom replacement policy instead of the configured built-in
    pub fn policy(mut self, policy: Box<dyn ReplacementPolicy<K>>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Route handled errors to `sink` instead of `tracing`
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the thread-safe variant
    ///
    /// The lock granularity comes from the configuration; an unsynchronized
    /// configuration falls back to the default striping.
    pub fn build(self) -> CacheResult<Cache<K, V, C>> {
        let granularity = match self.config.concurrency {
            Concurrency::Synchronized(granularity) => granularity,
            Concurrency::Unsynchronized => LockGranularity::default(),
        };
        let core = self.into_core()?;
        debug!(?granularity, "building synchronized cache");
        Ok(Cache::from_core(core, granularity))
    }

    /// Build the single-threaded variant
    pub fn build_local(self) -> CacheResult<LocalCache<K, V, C>> {
        let core = self.into_core()?;
        debug!("building unsynchronized cache");
        Ok(LocalCache::from_core(core))
    }

    /// Build whichever variant the configuration selects
    pub fn build_boxed(self) -> CacheResult<Box<dyn CacheApi<K, V>>> {
        Ok(match self.config.concurrency {
            Concurrency::Unsynchronized => Box::new(self.build_local()?),
            Concurrency::Synchronized(_) => Box::new(self.build()?),
        })
    }

    fn into_core(self) -> CacheResult<CacheCore<K, V, C>> {
        self.config.validate()?;
        let policy = self.policy.unwrap_or_else(|| policy::for_kind(self.config.eviction_policy));
        debug!(
            policy = policy.name(),
            max_entries = ?self.config.max_entries,
            max_total_cost = ?self.config.max_total_cost,
            max_total_size = ?self.config.max_total_size,
            loader = self.loader.is_some(),
            store = self.store.is_some(),
            "assembling cache core"
        );
        Ok(CacheCore::new(self.config, policy, self.loader, self.store, self.sink, self.clock))
    }
}

impl<K, V, C: fmt::Debug> fmt::Debug for CacheBuilder<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("loader", &self.loader.is_some())
            .field("store", &self.store.is_some())
            .field("custom_policy", &self.policy.is_some())
            .finish_non_exhaustive()
    }
}
