//! Least-recently-used policy
//!
//! Wraps the `lru` crate's linked hash map as a pure access-order index: the
//! map holds no values, only the recency order of the tracked keys.

use std::hash::Hash;

use ::lru::LruCache;

use super::ReplacementPolicy;
use crate::entry::Weight;
use crate::error::{PolicyError, PolicyResult};

/// LRU ordering with O(1) add, touch, remove and evict
///
/// # Examples
///
/// ```
/// use stowage_cache::policy::{LruPolicy, ReplacementPolicy};
/// use stowage_cache::Weight;
///
/// let mut policy = LruPolicy::new();
/// policy.add("a", Weight::UNIT).unwrap();
/// policy.add("b", Weight::UNIT).unwrap();
/// policy.touch(&"a").unwrap();
///
/// assert_eq!(policy.evict_next().unwrap(), "b");
/// ```
#[derive(Debug)]
pub struct LruPolicy<K>
where
    K: Hash + Eq,
{
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> LruPolicy<K> {
    /// Create an empty LRU policy
    pub fn new() -> Self {
        Self { order: LruCache::unbounded() }
    }

    /// Keys from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.iter().map(|(key, _)| key)
    }
}

impl<K: Hash + Eq> Default for LruPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ReplacementPolicy<K> for LruPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "lru"
    }

    fn add(&mut self, key: K, _weight: Weight) -> PolicyResult<()> {
        if self.order.contains(&key) {
            return Err(PolicyError::DuplicateKey);
        }
        self.order.put(key, ());
        Ok(())
    }

    fn touch(&mut self, key: &K) -> PolicyResult<()> {
        if !self.order.contains(key) {
            return Err(PolicyError::UnknownKey);
        }
        self.order.promote(key);
        Ok(())
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
