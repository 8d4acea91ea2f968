//! Embeddable key-value cache engine.
//!
//! The engine keeps a bounded set of entries in memory, evicts them with a
//! pluggable replacement policy when count, cost or size limits are
//! exceeded, fills misses through an optional [`Loader`](bridge::Loader),
//! persists writes through an optional [`Store`](bridge::Store) and expires
//! entries by time-to-live.
//!
//! # Variants
//!
//! - [`Cache`]: thread-safe, striped or wide locking, per-key and
//!   whole-cache locks, background loads and an eager expiration sweeper.
//! - [`LocalCache`]: single-threaded with no internal locking.
//!
//! Both implement [`CacheApi`] and are assembled by [`CacheBuilder`].
//!
//! # Example
//! ```
//! use stowage_cache::{Attributes, CacheApi, CacheConfig, EvictionPolicy, LocalCache};
//!
//! let config = CacheConfig::builder()
//!     .max_total_size(64)
//!     .eviction_policy(EvictionPolicy::Landlord)
//!     .build();
//! let cache: LocalCache<&str, Vec<u8>> = LocalCache::new(config).unwrap();
//!
//! cache.put_with("thumb", vec![0; 16], Attributes::new().with_size(16).with_cost(4.0)).unwrap();
//! assert_eq!(cache.stats().total_size, 16);
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod bridge;
pub mod capability;
pub mod config;
mod engine;
pub mod entry;
pub mod error;
pub mod expiration;
pub mod health;
pub mod policy;
pub mod sink;
pub mod stats;
pub mod store;
pub mod time;

pub use bridge::{FnLoader, Loader, Store};
pub use capability::CapabilityDescriptor;
pub use config::{
    CacheConfig, CacheConfigBuilder, Concurrency, EvictionPolicy, ExpirationMode, LockGranularity,
    StoreFailurePolicy, WriteStrategy,
};
pub use engine::{
    Cache, CacheApi, CacheBuilder, CacheKey, CacheLock, CacheValue, EntryLock, LocalCache,
    PendingLoad,
};
pub use entry::{Attributes, EntryView, Weight};
pub use error::{
    CacheError, CacheResult, ErrorClassification, ErrorSeverity, LoadError, PolicyError,
    PolicyResult, StoreError,
};
pub use health::{CacheHealth, CacheHealthReport};
pub use policy::ReplacementPolicy;
pub use sink::{ErrorSink, Operation, TracingErrorSink};
pub use stats::CacheStats;
pub use time::{Clock, MockClock, SystemClock};
