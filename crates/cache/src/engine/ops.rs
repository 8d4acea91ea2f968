//! Engine operations shared by both variants
//!
//! Every function here takes the core through [`CoreAccess`] in short
//! critical sections. Loader calls and the write-through store calls made on
//! behalf of a caller run between those sections, never while the core is
//! borrowed. Async writes are queued on the cache's background writer from
//! inside the section that applied them, which fixes their order.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use tracing::warn;

use super::core::{CacheCore, LoadTicket, Lookup};
use super::writer::WriteJob;
use super::{CacheKey, CacheValue};
use crate::config::{StoreFailurePolicy, WriteStrategy};
use crate::entry::Attributes;
use crate::error::{CacheError, CacheResult};
use crate::sink::Operation;
use crate::time::Clock;

/// Scoped access to a variant's core
pub(crate) trait CoreAccess<K, V, C> {
    fn with_core<R>(&self, f: impl FnOnce(&mut CacheCore<K, V, C>) -> R) -> R;
}

pub(crate) fn get<K, V, C, A>(access: &A, key: &K) -> CacheResult<Option<V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    match access.with_core(|core| core.lookup(key))? {
        Lookup::Hit(value) => Ok(Some(value)),
        Lookup::Miss => Ok(None),
        Lookup::Load(ticket) => run_load(access, ticket),
    }
}

/// Call the loader outside the core, then apply the outcome
pub(crate) fn run_load<K, V, C, A>(access: &A, ticket: LoadTicket<K, V>) -> CacheResult<Option<V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    let mut attributes = Attributes::new();
    let outcome = ticket.loader.load(&ticket.key, &mut attributes);
    access.with_core(|core| core.complete_load(ticket, outcome, &attributes))
}

pub(crate) fn get_all<K, V, C, A>(access: &A, keys: &[K]) -> CacheResult<HashMap<K, V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    let mut found = HashMap::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = get(access, key)? {
            found.insert(key.clone(), value);
        }
    }
    Ok(found)
}

pub(crate) fn put<K, V, C, A>(
    access: &A,
    key: K,
    value: V,
    attributes: Attributes,
) -> CacheResult<Option<V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    attributes.validate()?;
    let plan = access.with_core(|core| core.write_plan());
    let Some(store) = plan.store.clone() else {
        return access.with_core(|core| core.install(key, value, &attributes, false));
    };

    match plan.strategy {
        WriteStrategy::WriteThrough | WriteStrategy::WriteThroughSafe => {
            let mut dirty = false;
            if let Err(source) = store.store(&key, &value, &attributes) {
                let err = CacheError::store_failure(&key, source);
                access.with_core(|core| core.record_store_failure(Operation::Put, &err));
                match plan.on_failure {
                    StoreFailurePolicy::FailOperation => return Err(err),
                    StoreFailurePolicy::RetryOnNextAccess => dirty = true,
                }
            }
            access.with_core(|core| core.install(key, value, &attributes, dirty))
        }
        WriteStrategy::WriteThroughAsync => access.with_core(|core| -> CacheResult<Option<V>> {
            let previous = core.install(key.clone(), value.clone(), &attributes, false)?;
            core.persist_later(WriteJob::Store { key, value, attributes });
            Ok(previous)
        }),
        WriteStrategy::WriteBack { .. } => {
            access.with_core(|core| core.install(key, value, &attributes, true))
        }
    }
}

pub(crate) fn put_if_absent<K, V, C, A>(
    access: &A,
    key: K,
    value: V,
    attributes: Attributes,
) -> CacheResult<Option<V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    if let Some(existing) = access.with_core(|core| core.peek(&key))? {
        return Ok(Some(existing));
    }
    put(access, key, value, attributes).map(|_| None)
}

pub(crate) fn remove<K, V, C, A>(access: &A, key: &K) -> CacheResult<Option<V>>
where
    K: CacheKey,
    V: CacheValue,
    C: Clock,
    A: CoreAccess<K, V, C>,
{
    let plan = access.with_core(|core| core.write_plan());
    let Some(store) = plan.store.clone() else {
        return access.with_core(|core| core.remove(key));
    };

    if plan.strategy == WriteStrategy::WriteThroughAsync {
        return access.with_core(|core| -> CacheResult<Option<V>> {
            let removed = core.remove(key)?;
            core.persist_later(WriteJob::Delete(key.clone()));
            Ok(removed)
        });
    }

    if let Err(source) = store.delete(key) {
        let err = CacheError::store_failure(key, source);
        access.with_core(|core| core.record_store_failure(Operation::Remove, &err));
        if plan.on_failure == StoreFailurePolicy::FailOperation {
            return Err(err);
        }
    }
    access.with_core(|core| core.remove(key))
}

/// Run `job` on a short-lived worker thread, or inline when no thread can be
/// spawned
pub(crate) fn spawn_or_run(name: &str, job: impl FnOnce() + Send + 'static) {
    // The job is shared so it can still run inline if spawning fails.
    let job = Arc::new(parking_lot::Mutex::new(Some(job)));
    let worker = Arc::clone(&job);
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        if let Some(job) = worker.lock().take() {
            job();
        }
    });
    if let Err(err) = spawned {
        warn!(error = %err, thread = name, "could not spawn worker; running inline");
        if let Some(job) = job.lock().take() {
            job();
        }
    }
}
