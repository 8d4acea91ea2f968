//! First-in-first-out policy
//!
//! Same linked index as [`LruPolicy`](super::LruPolicy), but accesses never
//! reorder it.

use std::hash::Hash;

use ::lru::LruCache;

use super::ReplacementPolicy;
use crate::entry::Weight;
use crate::error::{PolicyError, PolicyResult};

/// Evicts keys in insertion order
#[derive(Debug)]
pub struct FifoPolicy<K>
where
    K: Hash + Eq,
{
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> FifoPolicy<K> {
    /// Create an empty FIFO policy
    pub fn new() -> Self {
        Self { order: LruCache::unbounded() }
    }
}

impl<K: Hash + Eq> Default for FifoPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ReplacementPolicy<K> for FifoPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn add(&mut self, key: K, _weight: Weight) -> PolicyResult<()> {
        if self.order.contains(&key) {
            return Err(PolicyError::DuplicateKey);
        }
        self.order.put(key, ());
        Ok(())
    }

    fn touch(&mut self, key: &K) -> PolicyResult<()> {
        if self.order.contains(key) {
            Ok(())
        } else {
            Err(PolicyError::UnknownKey)
        }
    }

    fn remove(&mut self, key: &K) -> PolicyResult<()> {
        self.order.pop(key).ok_or(PolicyError::UnknownKey)
    }

    fn evict_next(&mut self) -> PolicyResult<K> {
        self.order.pop_lru().map(|(key, _)| key).ok_or(PolicyError::Empty)
    }

    fn contains(&self, key: &K) -> bool {
        self.order.contains(key)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_does_not_reorder() {
        let mut policy = FifoPolicy::new();
        policy.add("first", Weight::UNIT).expect("add");
        policy.add("second", Weight::UNIT).expect("add");
        policy.touch(&"first").expect("touch");

        assert_eq!(policy.evict_next(), Ok("first"));
        assert_eq!(policy.evict_next(), Ok("second"));
    }
}
