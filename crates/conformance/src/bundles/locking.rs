//! Entry-level and cache-wide locks
//!
//! Both bundles always run. A variant that declares the lock must grant it
//! reentrantly and exclude other threads; one that does not must refuse
//! every request with an unsupported-operation error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stowage_cache::{CacheConfig, CacheResult};

use super::{always, build_with, key, value, Bundle, Check};
use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, SharedCache};

const LOCKED_KEYS: [&str; 4] = ["a", "b", "c", "never-stored"];

pub(super) fn entry_lock_bundle() -> Bundle {
    Bundle {
        name: "entry_lock",
        skip_unless: always,
        checks: vec![
            Check::new("entry_lock_matches_declaration", entry_lock_matches_declaration),
            Check::new("entry_lock_excludes_other_threads", entry_lock_excludes_other_threads),
        ],
    }
}

pub(super) fn wide_lock_bundle() -> Bundle {
    Bundle {
        name: "wide_lock",
        skip_unless: always,
        checks: vec![
            Check::new("wide_lock_matches_declaration", wide_lock_matches_declaration),
            Check::new("wide_lock_excludes_other_threads", wide_lock_excludes_other_threads),
        ],
    }
}

fn expect_unsupported<T>(result: CacheResult<T>, what: &str) -> CheckResult {
    match result {
        Ok(_) => Err(ConformanceError::Assertion(format!("{what} granted without being declared"))),
        Err(err) if err.is_unsupported() => Ok(()),
        Err(err) => Err(ConformanceError::Assertion(format!(
            "{what} failed with {err} instead of unsupported"
        ))),
    }
}

fn entry_lock_matches_declaration(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;

    if !factory.capabilities().entry_lock_support {
        for name in LOCKED_KEYS {
            expect_unsupported(cache.lock_entry(&key(name)), "entry lock")?;
        }
        ensure_eq!(cache.get(&key("a"))?, value("1"), "cache usable after refused lock");
        return Ok(());
    }

    for name in LOCKED_KEYS {
        let outer = cache.lock_entry(&key(name))?;
        let inner = cache.lock_entry(&key(name))?;
        cache.put(key(name), name.to_owned())?;
        ensure_eq!(cache.get(&key(name))?, Some(name.to_owned()), "write under the entry lock");
        drop(inner);
        drop(outer);
    }
    Ok(())
}

fn wide_lock_matches_declaration(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;

    if !factory.capabilities().wide_lock_support {
        expect_unsupported(cache.lock_all(), "wide lock")?;
        expect_unsupported(cache.lock_all(), "repeated wide lock")?;
        ensure_eq!(cache.get(&key("a"))?, value("1"), "cache usable after refused lock");
        return Ok(());
    }

    let guard = cache.lock_all()?;
    let entry = cache.lock_entry(&key("a"))?;
    cache.put(key("b"), "2".into())?;
    ensure_eq!(cache.len(), 2, "writes by the lock holder");
    drop(entry);
    drop(guard);
    Ok(())
}

fn shared(factory: &dyn CacheFactory) -> Result<SharedCache, ConformanceError> {
    let created = factory
        .create_shared(Blueprint::new(CacheConfig::default()))
        .ok_or(ConformanceError::Unavailable("a thread-safe instance"))?;
    Ok(created?)
}

/// Spawn a writer for `name` and report whether it finished within the grace period
fn writer_blocked(
    cache: &SharedCache,
    name: &str,
) -> (thread::JoinHandle<()>, Arc<AtomicBool>, bool) {
    let done = Arc::new(AtomicBool::new(false));
    let handle = {
        let cache = Arc::clone(cache);
        let done = Arc::clone(&done);
        let key = key(name);
        thread::spawn(move || {
            let _ = cache.put(key, "writer".into());
            done.store(true, Ordering::SeqCst);
        })
    };
    thread::sleep(Duration::from_millis(50));
    let blocked = !done.load(Ordering::SeqCst);
    (handle, done, blocked)
}

fn finish(handle: thread::JoinHandle<()>, done: &AtomicBool) -> CheckResult {
    handle.join().map_err(|_| ConformanceError::Panicked("writer thread".into()))?;
    ensure!(done.load(Ordering::SeqCst), "writer never completed");
    Ok(())
}

fn entry_lock_excludes_other_threads(factory: &dyn CacheFactory) -> CheckResult {
    if !factory.capabilities().entry_lock_support {
        return Ok(());
    }
    let cache = shared(factory)?;

    let guard = cache.lock_entry(&key("k"))?;
    let (handle, done, blocked) = writer_blocked(&cache, "k");
    drop(guard);
    finish(handle, &done)?;

    ensure!(blocked, "another thread wrote a locked key");
    ensure_eq!(cache.get(&key("k"))?, value("writer"), "write after unlock");
    Ok(())
}

fn wide_lock_excludes_other_threads(factory: &dyn CacheFactory) -> CheckResult {
    if !factory.capabilities().wide_lock_support {
        return Ok(());
    }
    let cache = shared(factory)?;

    let guard = cache.lock_all()?;
    let (handle, done, blocked) = writer_blocked(&cache, "any");
    drop(guard);
    finish(handle, &done)?;

    ensure!(blocked, "another thread wrote under the wide lock");
    ensure_eq!(cache.len(), 1, "entries after unlock");
    Ok(())
}

#[cfg(test)]
mod tests {
    use stowage_cache::CacheError;

    use super::*;

    #[test]
    fn test_expect_unsupported_distinguishes_errors() {
        let unsupported = CacheError::unsupported("lock_all", "X");
        assert!(expect_unsupported::<()>(Err(unsupported), "lock").is_ok());
        assert!(expect_unsupported(Ok(()), "lock").is_err());
        let other = CacheError::InvalidConfig("bad".into());
        assert!(expect_unsupported::<()>(Err(other), "lock").is_err());
    }
}
