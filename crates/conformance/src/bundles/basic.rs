//! Core map contract: writes, reads, removal and clearing

use stowage_cache::CacheConfig;

use super::{always, build_with, key, value, Bundle, Check};
use crate::error::CheckResult;
use crate::factory::CacheFactory;

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "basic",
        skip_unless: always,
        checks: vec![
            Check::new("put_then_get_round_trips", put_then_get_round_trips),
            Check::new("put_returns_replaced_value", put_returns_replaced_value),
            Check::new("remove_returns_value_once", remove_returns_value_once),
            Check::new("put_if_absent_keeps_existing", put_if_absent_keeps_existing),
            Check::new("get_all_returns_present_keys", get_all_returns_present_keys),
            Check::new("clear_empties_cache", clear_empties_cache),
            Check::new("stats_count_hits_and_misses", stats_count_hits_and_misses),
        ],
    }
}

fn put_then_get_round_trips(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    ensure!(cache.is_empty(), "new cache is not empty");

    cache.put(key("a"), "1".into())?;
    ensure_eq!(cache.get(&key("a"))?, value("1"), "get after put");
    ensure!(cache.contains_key(&key("a"))?, "contains_key misses a stored key");
    ensure_eq!(cache.get(&key("b"))?, None, "get of an absent key");
    ensure_eq!(cache.len(), 1, "len");
    Ok(())
}

fn put_returns_replaced_value(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    ensure_eq!(cache.put(key("a"), "1".into())?, None, "first put");
    ensure_eq!(cache.put(key("a"), "2".into())?, value("1"), "replacing put");
    ensure_eq!(cache.get(&key("a"))?, value("2"), "value after replacement");
    ensure_eq!(cache.len(), 1, "len after replacement");
    Ok(())
}

fn remove_returns_value_once(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;
    ensure_eq!(cache.remove(&key("a"))?, value("1"), "first remove");
    ensure_eq!(cache.remove(&key("a"))?, None, "second remove");
    ensure!(!cache.contains_key(&key("a"))?, "removed key still present");
    ensure_eq!(cache.stats().removals, 1, "removal count");
    Ok(())
}

fn put_if_absent_keeps_existing(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    ensure_eq!(cache.put_if_absent(key("a"), "1".into())?, None, "put_if_absent on a new key");
    ensure_eq!(
        cache.put_if_absent(key("a"), "2".into())?,
        value("1"),
        "put_if_absent on an existing key"
    );
    ensure_eq!(cache.get(&key("a"))?, value("1"), "value after put_if_absent");
    Ok(())
}

fn get_all_returns_present_keys(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;
    cache.put(key("c"), "3".into())?;

    let found = cache.get_all(&[key("a"), key("b"), key("c")])?;
    ensure_eq!(found.len(), 2, "get_all result size");
    ensure_eq!(found.get("a").cloned(), value("1"), "get_all value for a");
    ensure!(!found.contains_key("b"), "get_all invented a value for b");
    Ok(())
}

fn clear_empties_cache(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    for name in ["a", "b", "c"] {
        cache.put(key(name), name.to_owned())?;
    }
    cache.clear();
    ensure!(cache.is_empty(), "cache not empty after clear");
    ensure_eq!(cache.stats().total_cost, 0.0, "total cost after clear");
    ensure_eq!(cache.get(&key("a"))?, None, "get after clear");
    Ok(())
}

fn stats_count_hits_and_misses(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;
    cache.get(&key("a"))?;
    cache.get(&key("a"))?;
    cache.get(&key("b"))?;

    let stats = cache.stats();
    ensure_eq!(stats.hits, 2, "hits");
    ensure_eq!(stats.misses, 1, "misses");
    ensure_eq!(stats.size, 1, "size");
    Ok(())
}
