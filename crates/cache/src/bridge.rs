//! Loader/store collaborators
//!
//! A [`Loader`] fills misses from an external source and a [`Store`] persists
//! writes to it. Neither retries internally: failures go back to the engine,
//! which applies the configured store-failure policy and reports them to the
//! error sink.

use std::fmt;
use std::marker::PhantomData;

use crate::entry::Attributes;
use crate::error::{LoadError, StoreError};

/// Fills cache misses from a backing source
///
/// `attributes` starts empty; the loader may annotate it (cost, size, TTL or
/// free-form values) and the engine applies those to the loaded entry.
/// Returning `Ok(None)` means the source has no value for the key.
pub trait Loader<K, V>: Send + Sync {
    /// Fetch the value for `key`
    fn load(&self, key: &K, attributes: &mut Attributes) -> Result<Option<V>, LoadError>;
}

/// Persists cache writes to a backing source
pub trait Store<K, V>: Send + Sync {
    /// Persist one value
    fn store(&self, key: &K, value: &V, attributes: &Attributes) -> Result<(), StoreError>;

    /// Delete the persisted value for `key`
    fn delete(&self, key: &K) -> Result<(), StoreError>;

    /// Persist a batch; stops at the first failure
    fn store_all(&self, entries: &[(K, V)]) -> Result<(), StoreError> {
        let attributes = Attributes::new();
        entries.iter().try_for_each(|(key, value)| self.store(key, value, &attributes))
    }

    /// Delete a batch; stops at the first failure
    fn delete_all(&self, keys: &[K]) -> Result<(), StoreError> {
        keys.iter().try_for_each(|key| self.delete(key))
    }
}

/// [`Loader`] backed by a closure
///
/// # Example
/// ```
/// use stowage_cache::bridge::{FnLoader, Loader};
/// use stowage_cache::Attributes;
///
/// let loader = FnLoader::new(|key: &u32, _: &mut Attributes| Ok(Some(key * 2)));
/// assert_eq!(loader.load(&21, &mut Attributes::new()), Ok(Some(42)));
/// ```
pub struct FnLoader<K, V, F> {
    load: F,
    _types: PhantomData<fn(&K) -> V>,
}

impl<K, V, F> FnLoader<K, V, F>
where
    F: Fn(&K, &mut Attributes) -> Result<Option<V>, LoadError> + Send + Sync,
{
    /// Wrap a closure as a loader
    pub fn new(load: F) -> Self {
        Self { load, _types: PhantomData }
    }
}

impl<K, V, F> Loader<K, V> for FnLoader<K, V, F>
where
    F: Fn(&K, &mut Attributes) -> Result<Option<V>, LoadError> + Send + Sync,
{
    fn load(&self, key: &K, attributes: &mut Attributes) -> Result<Option<V>, LoadError> {
        (self.load)(key, attributes)
    }
}

impl<K, V, F> fmt::Debug for FnLoader<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").finish_non_exhaustive()
    }
}
