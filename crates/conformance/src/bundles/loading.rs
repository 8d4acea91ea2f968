//! Miss-triggered loading through a loader

use std::sync::Arc;
use std::time::Duration;

use stowage_cache::{CacheConfig, CacheError, MockClock};

use super::{build, key, needs_loading, value, Bundle, Check};
use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, TestCache};
use crate::fixtures::RecordingLoader;

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "loading",
        skip_unless: needs_loading,
        checks: vec![
            Check::new("miss_invokes_loader_once", miss_invokes_loader_once),
            Check::new("absent_load_is_not_cached", absent_load_is_not_cached),
            Check::new("load_failure_is_not_cached", load_failure_is_not_cached),
            Check::new("loader_attributes_apply", loader_attributes_apply),
            Check::new("get_all_loads_only_missing_keys", get_all_loads_only_missing_keys),
            Check::new("contains_key_never_loads", contains_key_never_loads),
            Check::new("expired_entry_reloads_as_miss", expired_entry_reloads_as_miss),
        ],
    }
}

fn with_loader(
    factory: &dyn CacheFactory,
) -> Result<(TestCache, Arc<RecordingLoader>), ConformanceError> {
    let loader = Arc::new(RecordingLoader::with_values([("a", "1"), ("b", "2")]));
    let blueprint = Blueprint::new(CacheConfig::default()).with_loader(loader.clone());
    Ok((build(factory, blueprint)?, loader))
}

fn miss_invokes_loader_once(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    ensure_eq!(cache.get(&key("a"))?, value("1"), "loaded value");
    ensure_eq!(cache.get(&key("a"))?, value("1"), "cached value");
    ensure_eq!(loader.calls_for("a"), 1, "loader calls");

    let stats = cache.stats();
    ensure_eq!(stats.loads, 1, "loads");
    ensure_eq!((stats.hits, stats.misses), (1, 1), "hits and misses");
    Ok(())
}

fn absent_load_is_not_cached(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    ensure_eq!(cache.get(&key("nowhere"))?, None, "value with no source");
    ensure_eq!(cache.get(&key("nowhere"))?, None, "value with no source, again");
    ensure_eq!(loader.calls_for("nowhere"), 2, "loader calls for an absent key");
    ensure!(cache.is_empty(), "absence was cached");
    Ok(())
}

fn load_failure_is_not_cached(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    loader.fail("a");
    match cache.get(&key("a")) {
        Err(CacheError::LoadFailure { .. }) => {}
        other => {
            return Err(ConformanceError::Assertion(format!(
                "expected a load failure, got {other:?}"
            )));
        }
    }
    ensure_eq!(cache.stats().load_failures, 1, "load failures");
    ensure!(!cache.contains_key(&key("a"))?, "failed load left an entry");

    loader.recover("a");
    ensure_eq!(cache.get(&key("a"))?, value("1"), "value after recovery");
    Ok(())
}

fn loader_attributes_apply(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    loader.set_cost(7.0);
    cache.get(&key("a"))?;
    ensure_eq!(cache.stats().total_cost, 7.0, "cost annotated by the loader");
    Ok(())
}

fn get_all_loads_only_missing_keys(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    cache.put(key("b"), "cached".into())?;

    let found = cache.get_all(&[key("a"), key("b"), key("c")])?;
    ensure_eq!(found.len(), 2, "get_all result size");
    ensure_eq!(found.get("a").cloned(), value("1"), "loaded value");
    ensure_eq!(found.get("b").cloned(), value("cached"), "cached value");
    ensure_eq!(loader.calls_for("b"), 0, "loads of a cached key");
    ensure_eq!(loader.calls().len(), 2, "total loads");
    Ok(())
}

fn contains_key_never_loads(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, loader) = with_loader(factory)?;
    ensure!(!cache.contains_key(&key("a"))?, "contains_key reported an unloaded key");
    ensure!(loader.calls().is_empty(), "contains_key invoked the loader");
    Ok(())
}

fn expired_entry_reloads_as_miss(factory: &dyn CacheFactory) -> CheckResult {
    if !factory.capabilities().expiration_support {
        return Ok(());
    }
    let clock = MockClock::new();
    let loader = Arc::new(RecordingLoader::with_values([("a", "1")]));
    let blueprint = Blueprint::new(CacheConfig::ttl(Duration::from_millis(50)))
        .with_loader(loader.clone())
        .with_clock(clock.clone());
    let cache = build(factory, blueprint)?;

    cache.get(&key("a"))?;
    loader.set("a", "2");
    clock.advance_millis(50);
    ensure_eq!(cache.get(&key("a"))?, value("2"), "value reloaded after expiry");
    ensure_eq!(loader.calls_for("a"), 2, "loads of an expired key");
    ensure_eq!(cache.stats().expirations, 1, "expirations");
    Ok(())
}
