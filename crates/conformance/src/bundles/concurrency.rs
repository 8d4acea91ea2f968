//! Thread-safety of synchronized variants

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use stowage_cache::CacheConfig;

use super::{key, value, Bundle, Check};
use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, SharedCache};
use crate::fixtures::RecordingLoader;

const THREADS: usize = 8;

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "concurrency",
        skip_unless: needs_threads,
        checks: vec![
            Check::new("at_most_one_load_per_key", at_most_one_load_per_key),
            Check::new("limits_hold_under_contention", limits_hold_under_contention),
            Check::new("disjoint_writes_are_kept", disjoint_writes_are_kept),
            Check::new("write_during_load_wins", write_during_load_wins),
        ],
    }
}

fn needs_threads(factory: &dyn CacheFactory) -> Option<&'static str> {
    let blueprint = Blueprint::new(CacheConfig::default());
    factory.create_shared(blueprint).is_none().then_some("variant is not thread-safe")
}

fn shared(
    factory: &dyn CacheFactory,
    blueprint: Blueprint,
) -> Result<SharedCache, ConformanceError> {
    let created = factory
        .create_shared(blueprint)
        .ok_or(ConformanceError::Unavailable("a thread-safe instance"))?;
    Ok(created?)
}

/// Run `work(thread index, cache)` on every worker at once and join them
fn run_workers(cache: &SharedCache, work: fn(usize, &SharedCache) -> CheckResult) -> CheckResult {
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let cache = Arc::clone(cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                work(worker, &cache)
            })
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| ConformanceError::Panicked("worker thread".into()))??;
    }
    Ok(())
}

fn at_most_one_load_per_key(factory: &dyn CacheFactory) -> CheckResult {
    let loader = Arc::new(RecordingLoader::with_values([("k0", "0"), ("k1", "1"), ("k2", "2")]));
    loader.set_delay(Duration::from_millis(20));
    let blueprint = Blueprint::new(CacheConfig::default()).with_loader(loader.clone());
    let cache = shared(factory, blueprint)?;

    run_workers(&cache, |_, cache| {
        for (name, expected) in [("k0", "0"), ("k1", "1"), ("k2", "2")] {
            ensure_eq!(cache.get(&key(name))?, value(expected), "loaded value");
        }
        Ok(())
    })?;

    for name in ["k0", "k1", "k2"] {
        ensure_eq!(loader.calls_for(name), 1, format!("loads of {name}"));
    }
    Ok(())
}

fn limits_hold_under_contention(factory: &dyn CacheFactory) -> CheckResult {
    let cache = shared(factory, Blueprint::new(CacheConfig::lru(32)))?;

    run_workers(&cache, |worker, cache| {
        for i in 0..500 {
            let name = format!("k{}", (i * 7 + worker * 13) % 100);
            if i % 3 == 0 {
                cache.get(&name)?;
            } else if i % 7 == 0 {
                cache.remove(&name)?;
            } else {
                cache.put(name, i.to_string())?;
            }
            ensure!(cache.len() <= 32, "{} entries under contention", cache.len());
        }
        Ok(())
    })?;

    let stats = cache.stats();
    let reads_per_worker = (0..500).filter(|i| i % 3 == 0).count() as u64;
    ensure_eq!(stats.hits + stats.misses, reads_per_worker * THREADS as u64, "recorded lookups");
    ensure!(cache.len() <= 32, "{} entries after contention", cache.len());
    Ok(())
}

fn disjoint_writes_are_kept(factory: &dyn CacheFactory) -> CheckResult {
    let cache = shared(factory, Blueprint::new(CacheConfig::lru(THREADS * 50)))?;

    run_workers(&cache, |worker, cache| {
        for i in 0..50 {
            cache.put(format!("w{worker}-{i}"), i.to_string())?;
        }
        Ok(())
    })?;

    ensure_eq!(cache.len(), THREADS * 50, "entries after disjoint writes");
    for worker in 0..THREADS {
        ensure_eq!(cache.get(&format!("w{worker}-49"))?, value("49"), "last write of a worker");
    }
    Ok(())
}

/// A caller's write is never replaced by a load that was already running.
fn write_during_load_wins(factory: &dyn CacheFactory) -> CheckResult {
    let loader = Arc::new(RecordingLoader::with_values([("k", "loaded")]));
    loader.set_delay(Duration::from_millis(60));
    let cache = shared(factory, Blueprint::new(CacheConfig::default()).with_loader(loader))?;

    let reader = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.get(&key("k")))
    };
    thread::sleep(Duration::from_millis(20));
    cache.put(key("k"), "fresh".into())?;

    let read = reader.join().map_err(|_| ConformanceError::Panicked("reader thread".into()))??;
    ensure!(read.is_some(), "reader saw no value");
    ensure_eq!(cache.get(&key("k"))?, value("fresh"), "value after the load finished");
    Ok(())
}
