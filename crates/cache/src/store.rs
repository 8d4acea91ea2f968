//! Entry store: the key to entry map with attribute bookkeeping
//!
//! The store knows nothing about eviction or expiration. It keeps exactly one
//! entry per key, hands out copies rather than references, and maintains the
//! running cost and size totals incrementally.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use crate::entry::{EntryView, Weight};

#[derive(Debug, Clone)]
struct StoredEntry<V> {
    value: V,
    weight: Weight,
    created_at: Instant,
    last_access: Instant,
    hit_count: u64,
    version: u64,
    expires_at: Option<Instant>,
    sequence: u64,
}

impl<V: Clone> StoredEntry<V> {
    fn view(&self) -> EntryView<V> {
        EntryView {
            value: self.value.clone(),
            cost: self.weight.cost,
            size: self.weight.size,
            created_at: self.created_at,
            last_access: self.last_access,
            hit_count: self.hit_count,
            version: self.version,
            expires_at: self.expires_at,
        }
    }
}

/// Hash-indexed map from key to entry
#[derive(Debug)]
pub struct EntryStore<K, V> {
    entries: HashMap<K, StoredEntry<V>>,
    total_cost: f64,
    total_size: i64,
    next_version: u64,
    next_sequence: u64,
}

impl<K, V> Default for EntryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            total_cost: 0.0,
            total_size: 0,
            next_version: 0,
            next_sequence: 0,
        }
    }
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entry for `key`
    pub fn get(&self, key: &K) -> Option<EntryView<V>> {
        self.entries.get(key).map(StoredEntry::view)
    }

    /// Clone of the value for `key` without touching access bookkeeping
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Expiration time of `key`, if present and finite
    pub fn expires_at(&self, key: &K) -> Option<Instant> {
        self.entries.get(key).and_then(|entry| entry.expires_at)
    }

    /// Check if a key is stored (expired or not)
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace the entry for `key`, returning the previous entry
    ///
    /// A replacement keeps the original creation time and hit count; the
    /// version always moves forward.
    pub fn put(
        &mut self,
        key: K,
        value: V,
        weight: Weight,
        expires_at: Option<Instant>,
        now: Instant,
    ) -> Option<EntryView<V>> {
        self.next_version += 1;
        let version = self.next_version;

        if let Some(entry) = self.entries.get_mut(&key) {
            let previous = entry.view();
            self.total_cost += weight.cost - entry.weight.cost;
            self.total_size += weight.size - entry.weight.size;
            entry.value = value;
            entry.weight = weight;
            entry.last_access = now;
            entry.version = version;
            entry.expires_at = expires_at;
            return Some(previous);
        }

        self.next_sequence += 1;
        self.total_cost += weight.cost;
        self.total_size += weight.size;
        self.entries.insert(
            key,
            StoredEntry {
                value,
                weight,
                created_at: now,
                last_access: now,
                hit_count: 0,
                version,
                expires_at,
                sequence: self.next_sequence,
            },
        );
        None
    }

    /// Record a hit on `key` and return the current value
    ///
    /// A hit mutates the access bookkeeping, so it advances the version too.
    pub fn touch(&mut self, key: &K, now: Instant) -> Option<V> {
        let entry = self.entries.get_mut(key)?;
        self.next_version += 1;
        entry.version = self.next_version;
        entry.last_access = now;
        entry.hit_count += 1;
        Some(entry.value.clone())
    }

    /// Remove `key`, returning the removed entry
    pub fn remove(&mut self, key: &K) -> Option<EntryView<V>> {
        let entry = self.entries.remove(key)?;
        self.total_cost -= entry.weight.cost;
        self.total_size -= entry.weight.size;
        if self.entries.is_empty() {
            // Resynchronize to avoid drift from float subtraction.
            self.total_cost = 0.0;
        }
        Some(entry.view())
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0.0;
        self.total_size = 0;
    }

    /// Point-in-time copy of every entry in insertion order
    pub fn snapshot(&self) -> Vec<(K, EntryView<V>)> {
        let mut ordered: Vec<(&K, &StoredEntry<V>)> = self.entries.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.sequence);
        ordered.into_iter().map(|(key, entry)| (key.clone(), entry.view())).collect()
    }

    /// Keys whose expiration time is at or before `now`
    pub fn expired_keys(&self, now: Instant) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.expires_at.is_some_and(|at| now >= at))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Incrementally tracked sum of entry costs
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Incrementally tracked sum of entry sizes
    pub fn total_size(&self) -> i64 {
        self.total_size
    }

    /// Totals recomputed from scratch, for checking the running totals
    pub fn recomputed_totals(&self) -> (f64, i64) {
        self.entries
            .values()
            .fold((0.0, 0), |(cost, size), entry| {
                (cost + entry.weight.cost, size + entry.weight.size)
            })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for store.
    use std::time::Duration;

    use super::*;

    fn unit(cost: f64, size: i64) -> Weight {
        Weight { cost, size }
    }

    /// Validates `EntryStore::put` behavior for the insert and replace
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the first put returns `None`.
    /// - Confirms the replacement returns the old value and a lower version.
    /// - Confirms the totals follow the replacement weight.
    #[test]
    fn test_put_replaces_and_bumps_version() {
        let mut store = EntryStore::new();
        let now = Instant::now();

        assert!(store.put("a", 1, unit(2.0, 3), None, now).is_none());
        let first = store.get(&"a").expect("entry present");

        let previous = store.put("a", 10, unit(5.0, 1), None, now).expect("previous entry");
        assert_eq!(previous.value, 1);

        let current = store.get(&"a").expect("entry present");
        assert_eq!(current.value, 10);
        assert!(current.version > first.version);
        assert_eq!(current.created_at, first.created_at);
        assert_eq!(store.total_cost(), 5.0);
        assert_eq!(store.total_size(), 1);
    }

    #[test]
    fn test_touch_records_hits() {
        let mut store = EntryStore::new();
        let start = Instant::now();
        store.put("k", "v", Weight::UNIT, None, start);
        let inserted = store.get(&"k").expect("entry present");

        let later = start + Duration::from_secs(1);
        assert_eq!(store.touch(&"k", later), Some("v"));
        assert_eq!(store.touch(&"missing", later), None);

        let view = store.get(&"k").expect("entry present");
        assert_eq!(view.hit_count, 1);
        assert_eq!(view.last_access, later);
        assert!(view.version > inserted.version);

        store.get(&"k");
        store.peek(&"k");
        assert_eq!(store.get(&"k").expect("entry present").version, view.version);
    }

    /// Validates the totals bookkeeping scenario.
    ///
    /// Assertions:
    /// - Confirms the running totals equal the recomputed sums after every
    ///   mutation.
    #[test]
    fn test_totals_track_sum_of_entries() {
        let mut store = EntryStore::new();
        let now = Instant::now();

        for i in 0..10_i64 {
            store.put(i, i, unit(i as f64, i * 2), None, now);
            assert_eq!((store.total_cost(), store.total_size()), store.recomputed_totals());
        }
        for i in (0..10_i64).step_by(3) {
            store.remove(&i);
            assert_eq!((store.total_cost(), store.total_size()), store.recomputed_totals());
        }
        store.clear();
        assert_eq!(store.total_size(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_in_insertion_order() {
        let mut store = EntryStore::new();
        let now = Instant::now();
        for key in ["c", "a", "b"] {
            store.put(key, key.len(), Weight::UNIT, None, now);
        }
        // Replacing keeps the original position.
        store.put("c", 7, Weight::UNIT, None, now);

        let keys: Vec<_> = store.snapshot().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_expired_keys_is_inclusive() {
        let mut store = EntryStore::new();
        let now = Instant::now();
        let deadline = now + Duration::from_secs(5);
        store.put("ttl", 1, Weight::UNIT, Some(deadline), now);
        store.put("forever", 2, Weight::UNIT, None, now);

        assert!(store.expired_keys(deadline - Duration::from_millis(1)).is_empty());
        assert_eq!(store.expired_keys(deadline), vec!["ttl"]);
    }
}
