//! Offline-optimal (Belady) analysis
//!
//! Given the complete access trace up front, the optimal policy evicts the
//! resident key whose next access lies farthest in the future, or that is
//! never accessed again. No online policy can miss less on the same trace,
//! which makes this the yardstick for [`replay`]ed online policies.
//!
//! Each access first brings its key in; when that pushes the resident set
//! over capacity, one key (possibly the one just accessed) is evicted
//! immediately after the access. The final access of a trace never records
//! an eviction because no later access competes for the slot.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::Serialize;

use super::ReplacementPolicy;
use crate::entry::Weight;
use crate::error::PolicyResult;

const NEVER: usize = usize::MAX;

/// Belady's offline-optimal replacement over a fixed trace
///
/// # Example
/// ```
/// use stowage_cache::policy::optimal::OptimalPolicy;
///
/// let mut optimal = OptimalPolicy::new(2);
/// optimal.access([1, 2, 3, 2, 3, 1, 3, 2, 3, 1, 3, 1, 2]);
///
/// assert_eq!(optimal.evict_at(2), Some(&1));
/// assert_eq!(optimal.evict_at(5), Some(&1));
/// assert_eq!(optimal.evict_at(9), Some(&2));
/// assert_eq!(optimal.evict_at(3), None);
/// ```
#[derive(Debug, Clone)]
pub struct OptimalPolicy<K> {
    capacity: usize,
    evictions: Vec<Option<K>>,
    hits: usize,
    misses: usize,
}

impl<K> OptimalPolicy<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an analysis for a cache holding `capacity` keys
    pub fn new(capacity: usize) -> Self {
        Self { capacity, evictions: Vec::new(), hits: 0, misses: 0 }
    }

    /// Consume a complete trace and compute every eviction decision
    ///
    /// Replaces the results of any earlier trace.
    pub fn access(&mut self, trace: impl IntoIterator<Item = K>) {
        let trace: Vec<K> = trace.into_iter().collect();
        let next_use = next_uses(&trace);

        self.evictions = vec![None; trace.len()];
        self.hits = 0;
        self.misses = 0;

        let mut resident: HashMap<K, (usize, Reverse<usize>)> = HashMap::new();
        let mut farthest: BTreeMap<(usize, Reverse<usize>), K> = BTreeMap::new();

        for (index, key) in trace.iter().enumerate() {
            let rank = (next_use[index], Reverse(index));
            match resident.insert(key.clone(), rank) {
                Some(previous) => {
                    self.hits += 1;
                    farthest.remove(&previous);
                }
                None => self.misses += 1,
            }
            farthest.insert(rank, key.clone());

            let last = index + 1 == trace.len();
            if resident.len() > self.capacity && !last {
                if let Some((_, victim)) = farthest.pop_last() {
                    resident.remove(&victim);
                    self.evictions[index] = Some(victim);
                }
            }
        }
    }

    /// Key evicted immediately after the access at `index`, if any
    pub fn evict_at(&self, index: usize) -> Option<&K> {
        self.evictions.get(index).and_then(Option::as_ref)
    }

    /// Every eviction as `(access index, victim)`
    pub fn evictions(&self) -> impl Iterator<Item = (usize, &K)> + '_ {
        self.evictions
            .iter()
            .enumerate()
            .filter_map(|(index, victim)| victim.as_ref().map(|key| (index, key)))
    }

    /// Capacity the analysis was computed for
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Accesses served from the resident set
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Accesses that had to bring their key in
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Best achievable hit ratio for this trace and capacity
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }
}

/// Index of the next access to the same key, or `NEVER`
fn next_uses<K: Eq + Hash + Clone>(trace: &[K]) -> Vec<usize> {
    let mut seen: HashMap<&K, usize> = HashMap::new();
    let mut next = vec![NEVER; trace.len()];
    for (index, key) in trace.iter().enumerate().rev() {
        if let Some(later) = seen.insert(key, index) {
            next[index] = later;
        }
    }
    next
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Optimal hit ratio for every capacity from 1 to `max_capacity`
pub fn hit_ratio_curve<K>(trace: &[K], max_capacity: usize) -> Vec<f64>
where
    K: Eq + Hash + Clone,
{
    (1..=max_capacity)
        .map(|capacity| {
            let mut optimal = OptimalPolicy::new(capacity);
            optimal.access(trace.iter().cloned());
            optimal.hit_ratio()
        })
        .collect()
}

/// Hit/miss counts of an online policy over a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    /// Accesses whose key was resident
    pub hits: usize,
    /// Accesses whose key had to be added
    pub misses: usize,
}

impl ReplayOutcome {
    /// Fraction of accesses that hit
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    /// Share of the optimal hit ratio this outcome achieves (1.0 = optimal)
    pub fn score_against<K>(&self, optimal: &OptimalPolicy<K>) -> f64
    where
        K: Eq + Hash + Clone,
    {
        let best = optimal.hit_ratio();
        if best == 0.0 {
            1.0
        } else {
            self.hit_ratio() / best
        }
    }
}

/// Drive an online policy through a trace with unit weights
///
/// Uses the same access model as [`OptimalPolicy`], so the two outcomes are
/// directly comparable.
pub fn replay<K, P>(policy: &mut P, trace: &[K], capacity: usize) -> PolicyResult<ReplayOutcome>
where
    K: Eq + Hash + Clone,
    P: ReplacementPolicy<K> + ?Sized,
{
    let mut outcome = ReplayOutcome { hits: 0, misses: 0 };
    for key in trace {
        if policy.contains(key) {
            outcome.hits += 1;
            policy.touch(key)?;
        } else {
            outcome.misses += 1;
            policy.add(key.clone(), Weight::UNIT)?;
        }
        while policy.len() > capacity {
            policy.evict_next()?;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    //! Unit tests for policy::optimal.
    use super::*;
    use crate::policy::{FifoPolicy, LruPolicy};

    const TRACE: [u32; 13] = [1, 2, 3, 2, 3, 1, 3, 2, 3, 1, 3, 1, 2];

    /// Validates Belady's rule on the reference trace with capacity 2.
    ///
    /// Assertions:
    /// - Confirms key 1 is evicted at indices 2 and 5, key 2 at index 9.
    /// - Confirms no other index records an eviction.
    #[test]
    fn test_reference_trace_evictions() {
        let mut optimal = OptimalPolicy::new(2);
        optimal.access(TRACE);

        let evictions: Vec<(usize, u32)> =
            optimal.evictions().map(|(index, key)| (index, *key)).collect();
        assert_eq!(evictions, vec![(2, 1), (5, 1), (9, 2)]);
        assert_eq!(optimal.misses(), 6);
        assert_eq!(optimal.hits(), 7);
    }

    #[test]
    fn test_evict_at_out_of_range() {
        let mut optimal = OptimalPolicy::new(1);
        optimal.access(["a", "b"]);
        assert_eq!(optimal.evict_at(0), None);
        assert_eq!(optimal.evict_at(1), None);
        assert_eq!(optimal.evict_at(99), None);
    }

    /// Validates that online policies never beat the optimum.
    ///
    /// Assertions:
    /// - Confirms LRU and FIFO misses are at least the optimal misses.
    /// - Confirms scores are within `(0, 1]`.
    #[test]
    fn test_online_policies_are_bounded_by_optimal() {
        let mut optimal = OptimalPolicy::new(2);
        optimal.access(TRACE);

        let lru = replay(&mut LruPolicy::new(), &TRACE, 2).expect("lru replay");
        let fifo = replay(&mut FifoPolicy::new(), &TRACE, 2).expect("fifo replay");

        for outcome in [lru, fifo] {
            assert!(outcome.misses >= optimal.misses());
            let score = outcome.score_against(&optimal);
            assert!(score > 0.0 && score <= 1.0);
        }
    }

    #[test]
    fn test_hit_ratio_curve_is_monotonic() {
        let curve = hit_ratio_curve(&TRACE, 3);
        assert_eq!(curve.len(), 3);
        assert!(curve.windows(2).all(|pair| pair[0] <= pair[1]));
        // Three distinct keys fit entirely: only compulsory misses remain.
        assert!((curve[2] - 10.0 / 13.0).abs() < 1e-12);
    }
}
