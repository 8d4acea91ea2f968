//! Replacement policies
//!
//! A policy only ranks keys; it never owns entries and never removes them
//! from the entry store. The engine reports every insertion, access and
//! removal, and asks the policy for victims when a limit is exceeded.
//!
//! | Policy     | Eviction basis                          |
//! |------------|-----------------------------------------|
//! | LRU        | Last access                             |
//! | FIFO       | Insertion order                         |
//! | LFU        | Access count, oldest first on ties      |
//! | Landlord   | Decaying cost/size credit               |
//!
//! [`optimal`] holds the offline Belady analysis, which consumes a full
//! trace and is never wired into a live cache.

mod fifo;
mod landlord;
mod lfu;
mod lru;
pub mod optimal;

use std::hash::Hash;

pub use fifo::FifoPolicy;
pub use landlord::LandlordPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;

use crate::config::EvictionPolicy;
use crate::entry::Weight;
use crate::error::PolicyResult;

/// Eviction decision strategy
///
/// Implementations fail fast with [`PolicyError`](crate::PolicyError) when
/// asked to evict from an empty state, to touch or remove a key they were
/// never given, or to add a key twice.
pub trait ReplacementPolicy<K>: Send {
    /// Short policy name used in logs
    fn name(&self) -> &'static str;

    /// Start tracking a newly inserted key
    fn add(&mut self, key: K, weight: Weight) -> PolicyResult<()>;

    /// Record an access to a tracked key
    fn touch(&mut self, key: &K) -> PolicyResult<()>;

    /// Stop tracking a key
    fn remove(&mut self, key: &K) -> PolicyResult<()>;

    /// Pick the next victim and stop tracking it
    fn evict_next(&mut self) -> PolicyResult<K>;

    /// Check if a key is tracked
    fn contains(&self, key: &K) -> bool;

    /// Number of tracked keys
    fn len(&self) -> usize;

    /// Check if no key is tracked
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every key
    fn clear(&mut self);
}

/// Instantiate the built-in policy named by the configuration
pub fn for_kind<K>(kind: EvictionPolicy) -> Box<dyn ReplacementPolicy<K>>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    match kind {
        EvictionPolicy::Lru => Box::new(LruPolicy::new()),
        EvictionPolicy::Fifo => Box::new(FifoPolicy::new()),
        EvictionPolicy::Lfu => Box::new(LfuPolicy::new()),
        EvictionPolicy::Landlord => Box::new(LandlordPolicy::new()),
    }
}
