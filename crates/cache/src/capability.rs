//! Optional features a cache variant declares
//!
//! Conformance suites read the descriptor to decide which checks apply. A
//! variant that declares a capability must honour it; one that does not must
//! reject the corresponding operations with
//! [`CacheError::UnsupportedOperation`](crate::CacheError::UnsupportedOperation).

use serde::{Deserialize, Serialize};

/// Capability flags of a cache variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Entry views with bookkeeping attributes
    pub entry_support: bool,
    /// Exclusive lock over the whole cache
    pub wide_lock_support: bool,
    /// Per-key exclusive locks
    pub entry_lock_support: bool,
    /// Miss-triggered loading through a loader
    pub loading_support: bool,
    /// Write persistence through a store
    pub store_support: bool,
    /// Time-to-live expiration
    pub expiration_support: bool,
}

impl CapabilityDescriptor {
    /// Descriptor with every capability declared
    pub const fn full() -> Self {
        Self {
            entry_support: true,
            wide_lock_support: true,
            entry_lock_support: true,
            loading_support: true,
            store_support: true,
            expiration_support: true,
        }
    }

    /// Descriptor with nothing declared
    pub const fn none() -> Self {
        Self {
            entry_support: false,
            wide_lock_support: false,
            entry_lock_support: false,
            loading_support: false,
            store_support: false,
            expiration_support: false,
        }
    }

    /// Same descriptor without any locking capability
    pub const fn without_locks(self) -> Self {
        Self { wide_lock_support: false, entry_lock_support: false, ..self }
    }

    /// Names of the declared capabilities, for reports
    pub fn declared(&self) -> Vec<&'static str> {
        [
            (self.entry_support, "entry"),
            (self.wide_lock_support, "wide_lock"),
            (self.entry_lock_support, "entry_lock"),
            (self.loading_support, "loading"),
            (self.store_support, "store"),
            (self.expiration_support, "expiration"),
        ]
        .into_iter()
        .filter_map(|(declared, name)| declared.then_some(name))
        .collect()
    }
}
