//! Cache factories the harness builds test subjects from

use std::fmt;
use std::sync::Arc;

use stowage_cache::{
    CacheApi, CacheBuilder, CacheConfig, CacheResult, CapabilityDescriptor, Concurrency, Loader,
    LockGranularity, MockClock, Store,
};

/// Cache under test, as seen by single-threaded checks
pub type TestCache = Box<dyn CacheApi<String, String>>;

/// Cache under test that can be shared across threads
pub type SharedCache = Arc<dyn CacheApi<String, String> + Send + Sync>;

/// Everything a check wants its cache built with
///
/// The factory decides the concurrency mode; every other setting comes from
/// the blueprint.
#[derive(Clone)]
pub struct Blueprint {
    /// Limits, policy, TTL and write settings
    pub config: CacheConfig,
    /// Loader consulted on misses
    pub loader: Option<Arc<dyn Loader<String, String>>>,
    /// Store receiving writes
    pub store: Option<Arc<dyn Store<String, String>>>,
    /// Clock the cache reads; checks keep a clone to move time
    pub clock: MockClock,
}

impl Blueprint {
    /// Blueprint with no collaborators and a fresh clock
    pub fn new(config: CacheConfig) -> Self {
        Self { config, loader: None, store: None, clock: MockClock::new() }
    }

    /// Attach a loader
    pub fn with_loader(mut self, loader: Arc<dyn Loader<String, String>>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Attach a store
    pub fn with_store(mut self, store: Arc<dyn Store<String, String>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `clock` instead of the fresh one
    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = clock;
        self
    }

    /// Cache builder carrying the blueprint's settings and collaborators
    pub fn builder(self) -> CacheBuilder<String, String, MockClock> {
        let mut builder = CacheBuilder::new(self.config).clock(self.clock);
        if let Some(loader) = self.loader {
            builder = builder.shared_loader(loader);
        }
        if let Some(store) = self.store {
            builder = builder.shared_store(store);
        }
        builder
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("config", &self.config)
            .field("loader", &self.loader.is_some())
            .field("store", &self.store.is_some())
            .field("clock", &self.clock.elapsed())
            .finish()
    }
}

/// A cache implementation the harness can test
pub trait CacheFactory {
    /// Short name used in reports
    fn variant(&self) -> &'static str;

    /// Features the implementation declares
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Build a fresh instance
    fn create(&self, blueprint: Blueprint) -> CacheResult<TestCache>;

    /// Build a fresh thread-safe instance; `None` for single-threaded variants
    fn create_shared(&self, _blueprint: Blueprint) -> Option<CacheResult<SharedCache>> {
        None
    }
}

/// Factory for the unsynchronized [`LocalCache`](stowage_cache::LocalCache)
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFactory;

impl CacheFactory for LocalFactory {
    fn variant(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::full().without_locks()
    }

    fn create(&self, mut blueprint: Blueprint) -> CacheResult<TestCache> {
        blueprint.config.concurrency = Concurrency::Unsynchronized;
        Ok(Box::new(blueprint.builder().build_local()?))
    }
}

/// Factory for the synchronized [`Cache`](stowage_cache::Cache)
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedFactory {
    granularity: LockGranularity,
}

impl SharedFactory {
    /// One lock for every key
    pub fn wide() -> Self {
        Self { granularity: LockGranularity::Wide }
    }

    /// `stripes` independent key locks
    pub fn striped(stripes: usize) -> Self {
        Self { granularity: LockGranularity::Striped { stripes } }
    }

    fn prepare(&self, mut blueprint: Blueprint) -> Blueprint {
        blueprint.config.concurrency = Concurrency::Synchronized(self.granularity);
        blueprint
    }
}

impl CacheFactory for SharedFactory {
    fn variant(&self) -> &'static str {
        match self.granularity {
            LockGranularity::Wide => "shared-wide",
            LockGranularity::Striped { .. } => "shared-striped",
        }
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::full()
    }

    fn create(&self, blueprint: Blueprint) -> CacheResult<TestCache> {
        Ok(Box::new(self.prepare(blueprint).builder().build()?))
    }

    fn create_shared(&self, blueprint: Blueprint) -> Option<CacheResult<SharedCache>> {
        let cache = self.prepare(blueprint).builder().build();
        Some(cache.map(|cache| Arc::new(cache) as SharedCache))
    }
}
