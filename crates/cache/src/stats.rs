//! Cache statistics and metrics tracking
//!
//! Counters are plain atomics updated by the engine; [`CacheStats`] is the
//! read-only snapshot handed to monitoring collaborators.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Statistics snapshot for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum allowed entries (None = unlimited)
    pub max_entries: Option<usize>,

    /// Sum of entry costs
    pub total_cost: f64,

    /// Sum of entry sizes
    pub total_size: i64,

    /// Lookups served from memory
    pub hits: u64,

    /// Lookups that found no live entry
    pub misses: u64,

    /// Successful loader invocations
    pub loads: u64,

    /// Failed loader invocations
    pub load_failures: u64,

    /// Load results discarded because the key changed meanwhile
    pub stale_loads: u64,

    /// Entries written by callers or loads
    pub inserts: u64,

    /// Entries removed by callers
    pub removals: u64,

    /// Entries removed by the replacement policy
    pub evictions: u64,

    /// Entries removed because their TTL elapsed
    pub expirations: u64,

    /// Failed store invocations
    pub store_failures: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate miss rate (misses / total accesses)
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    /// Calculate fill percentage (size / max_entries)
    pub fn fill_percentage(&self) -> Option<f64> {
        self.max_entries.map(|max| if max == 0 { 0.0 } else { self.size as f64 / max as f64 })
    }

    /// Total number of access operations (hits + misses)
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    stale_loads: AtomicU64,
    inserts: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    store_failures: AtomicU64,
}

/// Thread-safe metrics collector for cache operations
///
/// Clones share the same counters; when disabled every record call is a
/// no-op.
#[derive(Debug, Clone)]
pub(crate) struct MetricsCollector {
    counters: Arc<Counters>,
    enabled: bool,
}

macro_rules! recorder {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                if self.enabled {
                    self.counters.$field.fetch_add(1, Ordering::Relaxed);
                }
            }
        )*
    };
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub(crate) fn new(enabled: bool) -> Self {
        Self { counters: Arc::new(Counters::default()), enabled }
    }

    recorder! {
        record_hit => hits,
        record_miss => misses,
        record_load => loads,
        record_load_failure => load_failures,
        record_stale_load => stale_loads,
        record_insert => inserts,
        record_removal => removals,
        record_eviction => evictions,
        record_expiration => expirations,
        record_store_failure => store_failures,
    }

    /// Get current statistics snapshot
    pub(crate) fn snapshot(
        &self,
        size: usize,
        max_entries: Option<usize>,
        total_cost: f64,
        total_size: i64,
    ) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            size,
            max_entries,
            total_cost,
            total_size,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            loads: c.loads.load(Ordering::Relaxed),
            load_failures: c.load_failures.load(Ordering::Relaxed),
            stale_loads: c.stale_loads.load(Ordering::Relaxed),
            inserts: c.inserts.load(Ordering::Relaxed),
            removals: c.removals.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            store_failures: c.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for stats.
    use super::*;

    /// Validates `Default::default` behavior for the hit rate calculation
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `(stats.hit_rate() - 0.8).abs() < 1e-10` evaluates to true.
    /// - Ensures `(stats.miss_rate() - 0.2).abs() < 1e-10` evaluates to true.
    /// - Confirms `stats.total_accesses()` equals `100`.
    #[test]
    fn test_hit_rate_calculation() {
        let stats = CacheStats { hits: 80, misses: 20, ..Default::default() };

        assert!((stats.hit_rate() - 0.8).abs() < 1e-10);
        assert!((stats.miss_rate() - 0.2).abs() < 1e-10);
        assert_eq!(stats.total_accesses(), 100);
    }

    #[test]
    fn test_hit_rate_no_accesses() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.fill_percentage(), None);
    }

    #[test]
    fn test_fill_percentage() {
        let stats = CacheStats { size: 3, max_entries: Some(4), ..Default::default() };
        assert_eq!(stats.fill_percentage(), Some(0.75));
    }

    /// Validates the collector sharing scenario.
    ///
    /// Assertions:
    /// - Confirms clones record into the same counters.
    /// - Confirms a disabled collector records nothing.
    #[test]
    fn test_collector_shares_and_disables() {
        let metrics = MetricsCollector::new(true);
        let clone = metrics.clone();
        metrics.record_hit();
        clone.record_hit();
        clone.record_eviction();

        let stats = metrics.snapshot(1, Some(10), 1.0, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.evictions, 1);

        let disabled = MetricsCollector::new(false);
        disabled.record_miss();
        assert_eq!(disabled.snapshot(0, None, 0.0, 0).misses, 0);
    }
}
