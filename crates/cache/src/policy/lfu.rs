//! Least-frequently-used policy

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::ReplacementPolicy;
use crate::entry::Weight;
use crate::error::{PolicyError, PolicyResult};

/// Rank of a key: access count first, then insertion sequence
type Rank = (u64, u64);

/// Evicts the key with the fewest accesses; ties go to the oldest key
#[derive(Debug)]
pub struct LfuPolicy<K> {
    ranks: HashMap<K, Rank>,
    queue: BTreeMap<Rank, K>,
    sequence: u64,
}

impl<K> LfuPolicy<K> {
    /// Create an empty LFU policy
    pub fn new() -> Self {
        Self { ranks: HashMap::new(), queue: BTreeMap::new(), sequence: 0 }
    }
}

impl<K> Default for LfuPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LfuPolicy<K>
where
    K: Hash + Eq,
{
    /// Access count recorded for `key`
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.ranks.get(key).map(|(count, _)| *count)
    }
}

impl<K> ReplacementPolicy<K> for LfuPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "lfu"
    }

    fn add(&mut self, key: K, _weight: Weight) -> PolicyResult<()> {
        if self.ranks.contains_key(&key) {
            return Err(PolicyError::DuplicateKey);
        }
        self.sequence += 1;
        let rank = (0, self.sequence);
        self.ranks.insert(key.clone(), rank);
        self.queue.insert(rank, key);
        Ok(())
    }

    fn touch(&mut self, key: &K) -> PolicyResult<()> {
        let rank = self.ranks.get_mut(key).ok_or(PolicyError::UnknownKey)?;
        let old = *rank;
        rank.0 += 1;
        let new = *rank;
        if let Some(key) = self.queue.remove(&old) {
            self.queue.insert(new, key);
        }
        Ok(())
    }

    fn remove(&mut self, key: &K) -> PolicyResult<()> {
        let rank = self.ranks.remove(key).ok_or(PolicyError::UnknownKey)?;
        self.queue.remove(&rank);
        Ok(())
    }

    fn evict_next(&mut self) -> PolicyResult<K> {
        let (_, key) = self.queue.pop_first().ok_or(PolicyError::Empty)?;
        self.ranks.remove(&key);
        Ok(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.ranks.contains_key(key)
    }

    fn len(&self) -> usize {
        self.ranks.len()
    }

    fn clear(&mut self) {
        self.ranks.clear();
        self.queue.clear();
    }
}
