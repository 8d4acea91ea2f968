//! Landlord: cost/size aware eviction with decaying credits
//!
//! Each entry receives `cost / size` credit when it is added or touched. An
//! eviction charges every tracked entry the credit still held by the poorest
//! one, which then has zero credit and is evicted. With unit cost and size
//! this is LRU; with unit size it is cost-based, with unit cost size-based.
//!
//! Charging every entry on every eviction would be O(n). Instead the policy
//! keeps a running `rent` offset: an entry stores `rent + credit` at the time
//! it was credited, and its live credit is that value minus the current rent.
//! Evicting the minimum then raises the rent to the victim's stored value,
//! which charges everyone at once.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::ReplacementPolicy;
use crate::entry::Weight;
use crate::error::{PolicyError, PolicyResult};

/// Totally ordered f64 for use as a map key
#[derive(Debug, Clone, Copy)]
struct Level(f64);

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Level {}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Tenant {
    level: Level,
    density: f64,
    sequence: u64,
}

/// Generalized-clock policy over per-entry credit
#[derive(Debug)]
pub struct LandlordPolicy<K> {
    tenants: HashMap<K, Tenant>,
    queue: BTreeMap<(Level, u64), K>,
    rent: f64,
    sequence: u64,
}

impl<K> LandlordPolicy<K> {
    /// Create an empty Landlord policy
    pub fn new() -> Self {
        Self { tenants: HashMap::new(), queue: BTreeMap::new(), rent: 0.0, sequence: 0 }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

impl<K> Default for LandlordPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LandlordPolicy<K>
where
    K: Hash + Eq,
{
    /// Remaining credit of `key`; never negative
    pub fn credit(&self, key: &K) -> Option<f64> {
        self.tenants.get(key).map(|tenant| (tenant.level.0 - self.rent).max(0.0))
    }

    /// Credit of every tracked key
    pub fn credits(&self) -> impl Iterator<Item = (&K, f64)> + '_ {
        self.tenants.iter().map(|(key, tenant)| (key, (tenant.level.0 - self.rent).max(0.0)))
    }
}

impl<K> ReplacementPolicy<K> for LandlordPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "landlord"
    }

    fn add(&mut self, key: K, weight: Weight) -> PolicyResult<()> {
        if self.tenants.contains_key(&key) {
            return Err(PolicyError::DuplicateKey);
        }
        let density = weight.density();
        let tenant = Tenant {
            level: Level(self.rent + density),
            density,
            sequence: self.next_sequence(),
        };
        self.queue.insert((tenant.level, tenant.sequence), key.clone());
        self.tenants.insert(key, tenant);
        Ok(())
    }

    fn touch(&mut self, key: &K) -> PolicyResult<()> {
        let sequence = self.next_sequence();
        let rent = self.rent;
        let tenant = self.tenants.get_mut(key).ok_or(PolicyError::UnknownKey)?;
        let old = (tenant.level, tenant.sequence);
        tenant.level = Level(rent + tenant.density);
        tenant.sequence = sequence;
        let new = (tenant.level, tenant.sequence);
        if let Some(key) = self.queue.remove(&old) {
            self.queue.insert(new, key);
        }
        Ok(())
    }

    fn remove(&mut self, key: &K) -> PolicyResult<()> {
        let tenant = self.tenants.remove(key).ok_or(PolicyError::UnknownKey)?;
        self.queue.remove(&(tenant.level, tenant.sequence));
        Ok(())
    }

    fn evict_next(&mut self) -> PolicyResult<K> {
        let ((level, _), key) = self.queue.pop_first().ok_or(PolicyError::Empty)?;
        self.tenants.remove(&key);
        // The queue minimum never sits below the current rent.
        self.rent = self.rent.max(level.0);
        Ok(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.tenants.contains_key(key)
    }

    fn len(&self) -> usize {
        self.tenants.len()
    }

    fn clear(&mut self) {
        self.tenants.clear();
        self.queue.clear();
        self.rent = 0.0;
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for policy::landlord.
    use super::*;

    fn weight(cost: f64, size: i64) -> Weight {
        Weight { cost, size }
    }

    /// Validates the credit charging scenario.
    ///
    /// Assertions:
    /// - Confirms the entry with the lowest cost/size ratio goes first.
    /// - Confirms survivors are charged the victim's credit.
    #[test]
    fn test_eviction_charges_survivors() {
        let mut policy = LandlordPolicy::new();
        policy.add("cheap", weight(1.0, 1)).expect("add");
        policy.add("pricey", weight(10.0, 2)).expect("add");
        policy.add("bulky", weight(6.0, 3)).expect("add");

        assert_eq!(policy.evict_next(), Ok("cheap"));
        assert_eq!(policy.credit(&"pricey"), Some(4.0));
        assert_eq!(policy.credit(&"bulky"), Some(1.0));

        assert_eq!(policy.evict_next(), Ok("bulky"));
        assert_eq!(policy.credit(&"pricey"), Some(3.0));
    }

    #[test]
    fn test_touch_restores_full_credit() {
        let mut policy = LandlordPolicy::new();
        policy.add("a", weight(2.0, 1)).expect("add");
        policy.add("b", weight(5.0, 1)).expect("add");
        policy.add("c", weight(3.0, 1)).expect("add");

        assert_eq!(policy.evict_next(), Ok("a"));
        assert_eq!(policy.credit(&"c"), Some(1.0));

        policy.touch(&"c").expect("touch");
        assert_eq!(policy.credit(&"c"), Some(3.0));
        assert_eq!(policy.credit(&"b"), Some(3.0));

        // Equal credit: the less recently credited entry goes first.
        assert_eq!(policy.evict_next(), Ok("b"));
        assert_eq!(policy.evict_next(), Ok("c"));
    }

    /// Validates that unit weights reduce Landlord to LRU.
    ///
    /// Assertions:
    /// - Confirms the victim order equals least-recently-used order.
    #[test]
    fn test_unit_weights_behave_like_lru() {
        let mut policy = LandlordPolicy::new();
        for key in ["A", "B", "C"] {
            policy.add(key, Weight::UNIT).expect("add");
        }
        policy.touch(&"A").expect("touch");

        assert_eq!(policy.evict_next(), Ok("B"));
        policy.add("D", Weight::UNIT).expect("add");
        assert_eq!(policy.evict_next(), Ok("C"));
        assert_eq!(policy.evict_next(), Ok("A"));
        assert_eq!(policy.evict_next(), Ok("D"));
    }

    #[test]
    fn test_zero_size_counts_as_unit() {
        let mut policy = LandlordPolicy::new();
        policy.add(1, weight(4.0, 0)).expect("add");
        assert_eq!(policy.credit(&1), Some(4.0));
    }
}
