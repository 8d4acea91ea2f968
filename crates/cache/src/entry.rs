//! Entry attributes and views
//!
//! [`Attributes`] is the open annotation map passed between the engine and
//! its loader/store collaborators; the typed fields (`cost`, `size`, `ttl`)
//! are the ones the engine reads to drive policies and expiration.
//! [`EntryView`] is the copy of an entry handed out by the store.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// Attributes attached to a put or produced by a load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    cost: Option<f64>,
    size: Option<i64>,
    ttl: Option<Duration>,
    extra: BTreeMap<String, Value>,
}

impl Attributes {
    /// Empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replacement cost of the entry
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Set the size of the entry
    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set an explicit time-to-live, overriding the configured default
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the cost in place (used by loaders annotating a load)
    pub fn set_cost(&mut self, cost: f64) {
        self.cost = Some(cost);
    }

    /// Set the size in place
    pub fn set_size(&mut self, size: i64) {
        self.size = Some(size);
    }

    /// Set the TTL in place
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    /// Explicit cost, if any
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Explicit size, if any
    pub fn size(&self) -> Option<i64> {
        self.size
    }

    /// Explicit TTL, if any
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Attach a free-form annotation
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(name.into(), value.into());
    }

    /// Read a free-form annotation
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Reject a cost that is negative or not finite, and a negative size
    ///
    /// Such values would corrupt the running totals the capacity limits
    /// compare against.
    pub fn validate(&self) -> CacheResult<()> {
        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(CacheError::CapacityViolation(format!(
                    "entry cost must be finite and non-negative, got {cost}"
                )));
            }
        }
        if let Some(size) = self.size {
            if size < 0 {
                return Err(CacheError::CapacityViolation(format!(
                    "entry size must be non-negative, got {size}"
                )));
            }
        }
        Ok(())
    }

    /// Resolved weight, defaulting to unit cost and size
    pub fn weight(&self) -> Weight {
        Weight { cost: self.cost.unwrap_or(1.0), size: self.size.unwrap_or(1) }
    }
}

/// Cost and size pair a policy uses to rank an entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    /// Cost of re-fetching the entry
    pub cost: f64,
    /// Space the entry occupies
    pub size: i64,
}

impl Weight {
    /// Unit weight, under which cost-aware policies degrade to LRU
    pub const UNIT: Self = Self { cost: 1.0, size: 1 };

    /// Cost per unit of size; non-positive sizes count as one
    pub fn density(&self) -> f64 {
        let cost = if self.cost.is_finite() && self.cost > 0.0 { self.cost } else { 0.0 };
        cost / self.size.max(1) as f64
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Point-in-time copy of an entry and its bookkeeping attributes
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView<V> {
    /// Stored value
    pub value: V,
    /// Replacement cost
    pub cost: f64,
    /// Occupied size
    pub size: i64,
    /// When the entry was first inserted
    pub created_at: Instant,
    /// Last read or write
    pub last_access: Instant,
    /// Number of hits served since insertion
    pub hit_count: u64,
    /// Strictly increasing on every write to the entry and every recorded hit
    pub version: u64,
    /// Absolute expiry, if the entry has a TTL
    pub expires_at: Option<Instant>,
}

impl<V> EntryView<V> {
    /// True once `now` reaches the expiration time (inclusive)
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}
