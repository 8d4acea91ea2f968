//! Cache configuration types and builder patterns
//!
//! This module provides configuration types for customizing cache behavior,
//! including replacement policies, capacity limits, expiration, write
//! strategies and the concurrency variant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Replacement policy consulted when a capacity limit is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Least Recently Used - evicts the least recently accessed entry
    #[default]
    Lru,
    /// First In First Out - evicts the oldest entry by insertion time
    Fifo,
    /// Least Frequently Used - evicts the entry with the fewest hits
    Lfu,
    /// Cost/size aware credit policy (generalized clock)
    Landlord,
}

/// When expired entries are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpirationMode {
    /// Expired entries are dropped when they are next accessed
    #[default]
    Lazy,
    /// A background sweep additionally removes expired entries every
    /// `interval`, regardless of traffic
    Eager {
        /// Time between sweeps
        interval: Duration,
    },
}

/// Persistence timing for writes when a store is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteStrategy {
    /// Persist before acknowledging the write
    #[default]
    WriteThrough,
    /// Same observable behaviour as `WriteThrough`; kept as a distinct name
    WriteThroughSafe,
    /// Acknowledge immediately; the cache's writer thread persists writes
    /// and deletes in the order they were made
    WriteThroughAsync,
    /// Keep writes dirty in memory and persist them in batches
    WriteBack {
        /// Number of dirty entries that triggers a batch flush
        max_pending: usize,
    },
}

impl WriteStrategy {
    /// True when the store is called before the write is acknowledged
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::WriteThrough | Self::WriteThroughSafe)
    }
}

/// What happens to a write whose store call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreFailurePolicy {
    /// The write is rejected and the previous in-memory value is kept
    #[default]
    FailOperation,
    /// The write is kept in memory as dirty and persisted again on the next
    /// access to the key
    RetryOnNextAccess,
}

/// Lock layout of the synchronized variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockGranularity {
    /// One lock serializes every operation
    Wide,
    /// Keys hash onto `stripes` independent locks
    Striped {
        /// Number of lock stripes
        stripes: usize,
    },
}

impl LockGranularity {
    /// Number of key stripes this granularity maps to
    pub fn stripe_count(&self) -> usize {
        match self {
            Self::Wide => 1,
            Self::Striped { stripes } => *stripes,
        }
    }
}

impl Default for LockGranularity {
    fn default() -> Self {
        Self::Striped { stripes: 16 }
    }
}

/// Engine flavour selected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Concurrency {
    /// Single-threaded, no internal locking
    Unsynchronized,
    /// Thread-safe with the given lock layout
    Synchronized(LockGranularity),
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Synchronized(LockGranularity::default())
    }
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_entries: Option<usize>,

    /// Maximum sum of entry costs (None = unlimited)
    pub max_total_cost: Option<f64>,

    /// Maximum sum of entry sizes (None = unlimited)
    pub max_total_size: Option<i64>,

    /// Replacement policy used when a limit is exceeded
    pub eviction_policy: EvictionPolicy,

    /// Time-to-live applied when an insertion carries no explicit TTL
    pub default_ttl: Option<Duration>,

    /// How expired entries are removed
    pub expiration: ExpirationMode,

    /// Persistence timing for writes
    pub write_strategy: WriteStrategy,

    /// Reaction to failed store calls
    pub store_failure: StoreFailurePolicy,

    /// Engine flavour
    pub concurrency: Concurrency,

    /// Whether to collect hit/miss/eviction counters
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            max_total_cost: None,
            max_total_size: None,
            eviction_policy: EvictionPolicy::Lru,
            default_ttl: None,
            expiration: ExpirationMode::Lazy,
            write_strategy: WriteStrategy::WriteThrough,
            store_failure: StoreFailurePolicy::FailOperation,
            concurrency: Concurrency::default(),
            track_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for TTL-based cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use stowage_cache::CacheConfig;
    ///
    /// let config = CacheConfig::ttl(Duration::from_secs(3600));
    /// assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
    /// ```
    pub fn ttl(duration: Duration) -> Self {
        Self { default_ttl: Some(duration), ..Self::default() }
    }

    /// Quick preset for LRU cache
    ///
    /// # Example
    /// ```
    /// use stowage_cache::CacheConfig;
    ///
    /// let config = CacheConfig::lru(1000);
    /// assert_eq!(config.max_entries, Some(1000));
    /// ```
    pub fn lru(max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries), ..Self::default() }
    }

    /// Combined TTL + LRU cache
    pub fn ttl_lru(ttl: Duration, max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries), default_ttl: Some(ttl), ..Self::default() }
    }

    /// Size-bounded cache evicting by cost/size credit
    pub fn landlord(max_total_size: i64) -> Self {
        Self {
            max_total_size: Some(max_total_size),
            eviction_policy: EvictionPolicy::Landlord,
            ..Self::default()
        }
    }

    /// Check limits and intervals before a cache is built from this config
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_entries == Some(0) {
            return Err(CacheError::CapacityViolation("max_entries must be at least 1".into()));
        }
        if let Some(cost) = self.max_total_cost {
            if cost.is_nan() || cost < 0.0 {
                return Err(CacheError::CapacityViolation(format!(
                    "max_total_cost must be a non-negative number, got {cost}"
                )));
            }
        }
        if let Some(size) = self.max_total_size {
            if size < 0 {
                return Err(CacheError::CapacityViolation(format!(
                    "max_total_size must be non-negative, got {size}"
                )));
            }
        }
        if let ExpirationMode::Eager { interval } = self.expiration {
            if interval.is_zero() {
                return Err(CacheError::InvalidConfig(
                    "eager sweep interval must be non-zero".into(),
                ));
            }
        }
        if let WriteStrategy::WriteBack { max_pending } = self.write_strategy {
            if max_pending == 0 {
                return Err(CacheError::InvalidConfig(
                    "write-back max_pending must be at least 1".into(),
                ));
            }
        }
        if let Concurrency::Synchronized(granularity) = self.concurrency {
            if granularity.stripe_count() == 0 {
                return Err(CacheError::InvalidConfig("lock stripes must be at least 1".into()));
            }
        }
        Ok(())
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of entries
    pub fn max_entries(mut self, entries: usize) -> Self {
        self.config.max_entries = Some(entries);
        self
    }

    /// Set maximum total cost
    pub fn max_total_cost(mut self, cost: f64) -> Self {
        self.config.max_total_cost = Some(cost);
        self
    }

    /// Set maximum total size
    pub fn max_total_size(mut self, size: i64) -> Self {
        self.config.max_total_size = Some(size);
        self
    }

    /// Set replacement policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Set default time-to-live for entries
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.config.default_ttl = Some(duration);
        self
    }

    /// Set expiration mode
    pub fn expiration(mut self, mode: ExpirationMode) -> Self {
        self.config.expiration = mode;
        self
    }

    /// Set write strategy
    pub fn write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.config.write_strategy = strategy;
        self
    }

    /// Set store failure policy
    pub fn store_failure(mut self, policy: StoreFailurePolicy) -> Self {
        self.config.store_failure = policy;
        self
    }

    /// Set concurrency variant
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Enable or disable metrics tracking
    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
