//! Time-to-live expiration, lazy and eager

use std::time::Duration;

use stowage_cache::{Attributes, CacheConfig, ExpirationMode, MockClock};

use super::{build, key, needs_expiration, present, value, Bundle, Check};
use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, TestCache};

const TTL: Duration = Duration::from_millis(100);

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "expiration",
        skip_unless: needs_expiration,
        checks: vec![
            Check::new("ttl_boundary_is_inclusive", ttl_boundary_is_inclusive),
            Check::new("entry_ttl_overrides_default", entry_ttl_overrides_default),
            Check::new("entries_without_ttl_never_expire", entries_without_ttl_never_expire),
            Check::new("replacement_restarts_ttl", replacement_restarts_ttl),
            Check::new("expired_entries_are_invisible", expired_entries_are_invisible),
            Check::new("purge_removes_only_expired", purge_removes_only_expired),
        ],
    }
}

fn timed(
    factory: &dyn CacheFactory,
    config: CacheConfig,
) -> Result<(TestCache, MockClock), ConformanceError> {
    let clock = MockClock::new();
    let cache = build(factory, Blueprint::new(config).with_clock(clock.clone()))?;
    Ok((cache, clock))
}

fn ttl_boundary_is_inclusive(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, clock) = timed(factory, CacheConfig::ttl(TTL))?;
    cache.put(key("a"), "1".into())?;

    clock.advance(TTL - Duration::from_millis(1));
    ensure_eq!(cache.get(&key("a"))?, value("1"), "value just before the deadline");
    clock.advance_millis(1);
    ensure_eq!(cache.get(&key("a"))?, None, "value at the deadline");
    ensure_eq!(cache.stats().expirations, 1, "expirations");
    Ok(())
}

fn entry_ttl_overrides_default(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, clock) = timed(factory, CacheConfig::ttl(TTL))?;
    let short = Attributes::new().with_ttl(Duration::from_millis(10));
    cache.put_with(key("short"), "s".into(), short)?;
    cache.put(key("default"), "d".into())?;

    if factory.capabilities().entry_support {
        let view = present(cache.entry(&key("default"))?, "entry view")?;
        ensure_eq!(view.expires_at, Some(view.created_at + TTL), "default deadline");
    }

    clock.advance_millis(10);
    ensure!(!cache.contains_key(&key("short"))?, "short TTL entry outlived its deadline");
    ensure!(cache.contains_key(&key("default"))?, "default TTL entry expired early");
    Ok(())
}

fn entries_without_ttl_never_expire(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, clock) = timed(factory, CacheConfig::default())?;
    cache.put(key("a"), "1".into())?;
    clock.advance(Duration::from_secs(24 * 60 * 60));
    ensure_eq!(cache.get(&key("a"))?, value("1"), "value after a day");
    ensure_eq!(cache.purge_expired()?, 0, "purged entries");
    Ok(())
}

fn replacement_restarts_ttl(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, clock) = timed(factory, CacheConfig::ttl(TTL))?;
    cache.put(key("a"), "1".into())?;
    clock.advance_millis(60);
    cache.put(key("a"), "2".into())?;
    clock.advance_millis(60);
    ensure_eq!(cache.get(&key("a"))?, value("2"), "value after replacement");
    Ok(())
}

fn expired_entries_are_invisible(factory: &dyn CacheFactory) -> CheckResult {
    let (cache, clock) = timed(factory, CacheConfig::ttl(TTL))?;
    cache.put(key("a"), "1".into())?;
    clock.advance(TTL);

    ensure!(!cache.contains_key(&key("a"))?, "contains_key sees an expired entry");
    ensure!(cache.snapshot().is_empty(), "snapshot lists an expired entry");
    if factory.capabilities().entry_support {
        ensure!(cache.entry(&key("a"))?.is_none(), "entry view of an expired entry");
    }
    ensure_eq!(
        cache.put_if_absent(key("a"), "2".into())?,
        None,
        "put_if_absent over an expired entry"
    );
    ensure_eq!(cache.get(&key("a"))?, value("2"), "value after put_if_absent");
    Ok(())
}

fn purge_removes_only_expired(factory: &dyn CacheFactory) -> CheckResult {
    let config = CacheConfig::builder()
        .expiration(ExpirationMode::Eager { interval: Duration::from_secs(3600) })
        .build();
    let (cache, clock) = timed(factory, config)?;
    for name in ["a", "b"] {
        let short = Attributes::new().with_ttl(Duration::from_millis(10));
        cache.put_with(key(name), name.to_owned(), short)?;
    }
    cache.put(key("keep"), "k".into())?;

    clock.advance_millis(10);
    ensure_eq!(cache.purge_expired()?, 2, "purged entries");
    ensure_eq!(cache.len(), 1, "entries after purge");
    ensure_eq!(cache.stats().expirations, 2, "expirations");
    ensure!(cache.contains_key(&key("keep"))?, "purge removed a live entry");
    Ok(())
}
