//! Write persistence through a store, per write strategy

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stowage_cache::{CacheConfig, CacheError, StoreFailurePolicy, WriteStrategy};

use super::{build, key, needs_store, value, Bundle, Check};
use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, TestCache};
use crate::fixtures::{RecordingLoader, RecordingStore, StoreCall};

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "storing",
        skip_unless: needs_store,
        checks: vec![
            Check::new("write_through_persists_before_ack", write_through_persists_before_ack),
            Check::new("write_through_failure_rejects_write", write_through_failure_rejects_write),
            Check::new("retry_on_next_access_persists_later", retry_on_next_access_persists_later),
            Check::new("write_back_persists_in_batches", write_back_persists_in_batches),
            Check::new("write_back_flushes_evicted_entries", write_back_flushes_evicted_entries),
            Check::new(
                "write_through_async_persists_eventually",
                write_through_async_persists_eventually,
            ),
            Check::new("loaded_values_are_not_written", loaded_values_are_not_written),
        ],
    }
}

fn with_store(
    factory: &dyn CacheFactory,
    config: CacheConfig,
) -> Result<(TestCache, Arc<RecordingStore>), ConformanceError> {
    let store = Arc::new(RecordingStore::new());
    let cache = build(factory, Blueprint::new(config).with_store(store.clone()))?;
    Ok((cache, store))
}

fn write_back(max_pending: usize) -> CacheConfig {
    CacheConfig::builder().write_strategy(WriteStrategy::WriteBack { max_pending }).build()
}

fn write_through_persists_before_ack(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, store) = with_store(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;
    ensure_eq!(store.value("a"), value("1"), "persisted value after put");

    cache.remove(&key("a"))?;
    ensure_eq!(store.value("a"), None, "persisted value after remove");
    ensure_eq!(
        store.calls(),
        vec![StoreCall::Store(key("a")), StoreCall::Delete(key("a"))],
        "store calls"
    );
    Ok(())
}

fn write_through_failure_rejects_write(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, store) = with_store(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;

    store.set_failing(true);
    match cache.put(key("a"), "2".into()) {
        Err(CacheError::StoreFailure { .. }) => {}
        other => {
            return Err(ConformanceError::Assertion(format!(
                "expected a store failure, got {other:?}"
            )));
        }
    }
    ensure_eq!(cache.get(&key("a"))?, value("1"), "cached value after a rejected write");
    ensure_eq!(cache.stats().store_failures, 1, "store failures");
    Ok(())
}

fn retry_on_next_access_persists_later(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder()
        .write_strategy(WriteStrategy::WriteThroughSafe)
        .store_failure(StoreFailurePolicy::RetryOnNextAccess)
        .build();
    let (cache, store) = with_store(factory, config)?;

    store.set_failing(true);
    cache.put(key("a"), "1".into())?;
    ensure_eq!(cache.get(&key("a"))?, value("1"), "cached value while the store is down");
    ensure_eq!(store.value("a"), None, "value persisted by a failing store");

    store.set_failing(false);
    cache.get(&key("a"))?;
    ensure_eq!(store.value("a"), value("1"), "value persisted on the next access");
    Ok(())
}

fn write_back_persists_in_batches(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, store) = with_store(factory, write_back(3))?;
    cache.put(key("a"), "1".into())?;
    cache.put(key("b"), "2".into())?;
    ensure!(store.calls().is_empty(), "write-back persisted before the batch filled");

    cache.put(key("c"), "3".into())?;
    let calls = store.calls();
    ensure!(
        matches!(calls.as_slice(), [StoreCall::StoreAll(keys)] if keys.len() == 3),
        "expected one batch of three, got {calls:?}"
    );

    cache.put(key("d"), "4".into())?;
    ensure_eq!(cache.flush()?, 1, "entries flushed");
    ensure_eq!(store.value("d"), value("4"), "flushed value");
    ensure_eq!(cache.flush()?, 0, "second flush");
    Ok(())
}

fn write_back_flushes_evicted_entries(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder()
        .max_entries(1)
        .write_strategy(WriteStrategy::WriteBack { max_pending: 10 })
        .build();
    let (cache, store) = with_store(factory, config)?;
    cache.put(key("a"), "1".into())?;
    cache.put(key("b"), "2".into())?;

    ensure!(!cache.contains_key(&key("a"))?, "entry limit not enforced");
    ensure_eq!(store.value("a"), value("1"), "evicted dirty entry");
    ensure_eq!(store.value("b"), None, "resident dirty entry");
    Ok(())
}

fn write_through_async_persists_eventually(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder().write_strategy(WriteStrategy::WriteThroughAsync).build();
    let (cache, store) = with_store(factory, config)?;
    cache.put(key("a"), "1".into())?;
    ensure_eq!(cache.get(&key("a"))?, value("1"), "value acknowledged before persistence");

    let deadline = Instant::now() + Duration::from_secs(2);
    while store.value("a").is_none() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    ensure_eq!(store.value("a"), value("1"), "asynchronously persisted value");
    Ok(())
}

fn loaded_values_are_not_written(factory: &dyn CacheFactory) -> CheckResult {
    if !factory.capabilities().loading_support {
        return Ok(());
    }
    let store = Arc::new(RecordingStore::new());
    let loader = Arc::new(RecordingLoader::with_values([("a", "1")]));
    let blueprint = Blueprint::new(write_back(1)).with_store(store.clone()).with_loader(loader);
    let cache = build(factory, blueprint)?;

    ensure_eq!(cache.get(&key("a"))?, value("1"), "loaded value");
    ensure_eq!(cache.flush()?, 0, "dirty entries after a load");
    ensure!(store.is_empty(), "loaded value was written back");
    Ok(())
}
