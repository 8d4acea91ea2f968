//! Entry views and access bookkeeping

use stowage_cache::{Attributes, CacheConfig, MockClock};

use super::{build, build_with, key, needs_entry, present, Bundle, Check};
use crate::error::CheckResult;
use crate::factory::{Blueprint, CacheFactory};

pub(super) fn bundle() -> Bundle {
    Bundle {
        name: "entry",
        skip_unless: needs_entry,
        checks: vec![
            Check::new("entry_reports_attributes", entry_reports_attributes),
            Check::new("entry_tracks_hits_and_versions", entry_tracks_hits_and_versions),
            Check::new("touch_refreshes_recency", touch_refreshes_recency),
            Check::new("snapshot_lists_live_entries", snapshot_lists_live_entries),
        ],
    }
}

fn entry_reports_attributes(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    cache.put_with(key("a"), "1".into(), Attributes::new().with_cost(2.5).with_size(3))?;

    let view = present(cache.entry(&key("a"))?, "entry view of a stored key")?;
    ensure_eq!(view.value.as_str(), "1", "entry value");
    ensure_eq!(view.cost, 2.5, "entry cost");
    ensure_eq!(view.size, 3, "entry size");
    ensure_eq!(view.hit_count, 0, "hit count of a fresh entry");
    ensure_eq!(view.expires_at, None, "expiry without a TTL");
    ensure!(cache.entry(&key("b"))?.is_none(), "entry view for an absent key");
    Ok(())
}

/// Creation time and hit count survive a replacement; the version grows.
fn entry_tracks_hits_and_versions(factory: &dyn CacheFactory) -> CheckResult {
    let clock = MockClock::new();
    let cache = build(factory, Blueprint::new(CacheConfig::default()).with_clock(clock.clone()))?;

    cache.put(key("k"), "1".into())?;
    let first = present(cache.entry(&key("k"))?, "entry view after insert")?;
    cache.get(&key("k"))?;
    cache.get(&key("k"))?;
    clock.advance_millis(5);
    cache.put(key("k"), "2".into())?;
    let second = present(cache.entry(&key("k"))?, "entry view after replacement")?;

    ensure_eq!(second.value.as_str(), "2", "value after replacement");
    ensure_eq!(second.created_at, first.created_at, "creation time after replacement");
    ensure_eq!(second.hit_count, 2, "hit count");
    ensure!(
        second.version > first.version,
        "version {} did not grow past {}",
        second.version,
        first.version
    );
    ensure!(second.last_access > first.last_access, "last access did not move forward");
    Ok(())
}

fn touch_refreshes_recency(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::lru(2))?;
    cache.put(key("a"), "a".into())?;
    cache.put(key("b"), "b".into())?;

    ensure!(cache.touch(&key("a"))?, "touch of a stored key reported absent");
    ensure!(!cache.touch(&key("z"))?, "touch of an absent key reported present");
    cache.put(key("c"), "c".into())?;
    ensure!(cache.contains_key(&key("a"))?, "touched entry was evicted");
    ensure!(!cache.contains_key(&key("b"))?, "untouched entry survived");
    Ok(())
}

fn snapshot_lists_live_entries(factory: &dyn CacheFactory) -> CheckResult {
    let cache = build_with(factory, CacheConfig::default())?;
    for name in ["x", "y", "z"] {
        cache.put(key(name), name.to_uppercase())?;
    }
    cache.remove(&key("y"))?;

    let snapshot: Vec<(String, String)> =
        cache.snapshot().into_iter().map(|(key, view)| (key, view.value)).collect();
    ensure_eq!(
        snapshot,
        vec![(key("x"), "X".to_owned()), (key("z"), "Z".to_owned())],
        "snapshot contents"
    );
    Ok(())
}
