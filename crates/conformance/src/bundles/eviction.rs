//! Capacity limits and replacement order

use stowage_cache::{Attributes, CacheConfig, EvictionPolicy};

use super::{always, build_with, key, Bundle, Check};
use crate::error::CheckResult;
use crate::factory::CacheFactory;

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "eviction",
        skip_unless: always,
        checks: vec![
            Check::new("entry_limit_holds_after_every_put", entry_limit_holds_after_every_put),
            Check::new("lru_evicts_least_recent", lru_evicts_least_recent),
            Check::new("manual_evict_follows_policy", manual_evict_follows_policy),
            Check::new("cost_limit_holds", cost_limit_holds),
            Check::new("size_limit_holds", size_limit_holds),
            Check::new("fifo_ignores_reads", fifo_ignores_reads),
        ],
    }
}

fn entry_limit_holds_after_every_put(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::lru(3))?;
    for i in 0..10 {
        cache.put(format!("k{i}"), i.to_string())?;
        ensure!(cache.len() <= 3, "{} entries after put {i}", cache.len());
    }
    ensure_eq!(cache.stats().evictions, 7, "evictions");
    Ok(())
}

/// Access sequence A B C A D at capacity 3 leaves {C, A, D}.
fn lru_evicts_least_recent(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::lru(3))?;
    for name in ["A", "B", "C"] {
        cache.put(key(name), name.to_owned())?;
    }
    cache.get(&key("A"))?;
    cache.put(key("D"), "D".into())?;

    ensure!(!cache.contains_key(&key("B"))?, "B should have been evicted");
    for name in ["C", "A", "D"] {
        ensure!(cache.contains_key(&key(name))?, "{name} should be resident");
    }
    Ok(())
}

fn manual_evict_follows_policy(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::lru(10))?;
    for name in ["a", "b", "c"] {
        cache.put(key(name), name.to_owned())?;
    }
    cache.touch(&key("a"))?;

    ensure_eq!(cache.evict(2)?, vec![key("b"), key("c")], "evicted keys");
    ensure_eq!(cache.evict(5)?, vec![key("a")], "evicting past the end");
    ensure!(cache.is_empty(), "cache not empty after evicting everything");
    Ok(())
}

fn cost_limit_holds(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder().max_total_cost(10.0).build();
    let cache = build_with(factory, config)?;
    for name in ["a", "b", "c"] {
        cache.put_with(key(name), name.to_owned(), Attributes::new().with_cost(4.0))?;
        ensure!(cache.stats().total_cost <= 10.0, "total cost {}", cache.stats().total_cost);
    }
    ensure_eq!(cache.len(), 2, "entries within the cost limit");
    ensure!(!cache.contains_key(&key("a"))?, "oldest entry should have been evicted");
    Ok(())
}

fn size_limit_holds(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder().max_total_size(10).build();
    let cache = build_with(factory, config)?;
    cache.put_with(key("small"), "s".into(), Attributes::new().with_size(4))?;
    cache.put_with(key("huge"), "h".into(), Attributes::new().with_size(50))?;

    ensure!(cache.stats().total_size <= 10, "total size {}", cache.stats().total_size);
    ensure!(!cache.contains_key(&key("huge"))?, "oversized entry was kept");
    Ok(())
}

fn fifo_ignores_reads(factory: &dyn CacheFactory) -> CheckResult {
    let config =
        CacheConfig::builder().max_entries(2).eviction_policy(EvictionPolicy::Fifo).build();
    let cache = build_with(factory, config)?;
    cache.put(key("a"), "a".into())?;
    cache.put(key("b"), "b".into())?;
    cache.get(&key("a"))?;
    cache.put(key("c"), "c".into())?;

    ensure!(!cache.contains_key(&key("a"))?, "FIFO kept the oldest insert");
    ensure!(cache.contains_key(&key("b"))?, "FIFO evicted the wrong entry");
    Ok(())
}
