//! Conformance bundles
//!
//! A bundle groups the checks for one area of the cache contract. Every
//! check receives the factory and builds whatever cache it needs, so
//! bundles can run in any order or alone.

mod basic;
mod concurrency;
mod entry;
mod eviction;
mod expiration;
mod loading;
mod locking;
mod storing;

use std::fmt;

use stowage_cache::CacheConfig;

use crate::error::{CheckResult, ConformanceError};
use crate::factory::{Blueprint, CacheFactory, TestCache};

/// Decides whether a bundle applies; `Some(reason)` skips it
pub type Gate = fn(&dyn CacheFactory) -> Option<&'static str>;

/// One named check
#[derive(Clone, Copy)]
pub struct Check {
    /// Check name, unique within its bundle
    pub name: &'static str,
    /// Check body
    pub run: fn(&dyn CacheFactory) -> CheckResult,
}

impl Check {
    /// Named check
    pub const fn new(name: &'static str, run: fn(&dyn CacheFactory) -> CheckResult) -> Self {
        Self { name, run }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Check").field(&self.name).finish()
    }
}

/// Independent suite of checks for one area of the contract
#[derive(Clone)]
pub struct Bundle {
    /// Bundle name
    pub name: &'static str,
    /// Applicability gate
    pub skip_unless: Gate,
    /// Checks, run in order
    pub checks: Vec<Check>,
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle").field("name", &self.name).field("checks", &self.checks).finish()
    }
}

/// Every built-in bundle, in run order
pub fn all() -> Vec<Bundle> {
    vec![
        basic::bundle(),
        eviction::bundle(),
        entry::bundle(),
        locking::entry_lock_bundle(),
        locking::wide_lock_bundle(),
        loading::bundle(),
        storing::bundle(),
        expiration::bundle(),
        concurrency::bundle(),
    ]
}

fn always(_: &dyn CacheFactory) -> Option<&'static str> {
    None
}

fn missing(declared: bool, reason: &'static str) -> Option<&'static str> {
    (!declared).then_some(reason)
}

fn needs_entry(factory: &dyn CacheFactory) -> Option<&'static str> {
    missing(factory.capabilities().entry_support, "entry support not declared")
}

fn needs_loading(factory: &dyn CacheFactory) -> Option<&'static str> {
    missing(factory.capabilities().loading_support, "loading not declared")
}

fn needs_store(factory: &dyn CacheFactory) -> Option<&'static str> {
    missing(factory.capabilities().store_support, "store support not declared")
}

fn needs_expiration(factory: &dyn CacheFactory) -> Option<&'static str> {
    missing(factory.capabilities().expiration_support, "expiration not declared")
}

fn build(factory: &dyn CacheFactory, blueprint: Blueprint) -> Result<TestCache, ConformanceError> {
    Ok(factory.create(blueprint)?)
}

fn build_with(
    factory: &dyn CacheFactory,
    config: CacheConfig,
) -> Result<TestCache, ConformanceError> {
    build(factory, Blueprint::new(config))
}

fn present<T>(item: Option<T>, what: &str) -> Result<T, ConformanceError> {
    item.ok_or_else(|| ConformanceError::Assertion(format!("{what} is missing")))
}

fn key(name: &str) -> String {
    name.to_owned()
}

fn value(text: &str) -> Option<String> {
    Some(text.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_bundle_and_check_names_are_unique() {
        let bundles = all();
        let names: HashSet<_> = bundles.iter().map(|bundle| bundle.name).collect();
        assert_eq!(names.len(), bundles.len());
        for bundle in &bundles {
            let checks: HashSet<_> = bundle.checks.iter().map(|check| check.name).collect();
            assert_eq!(checks.len(), bundle.checks.len(), "{}", bundle.name);
            assert!(!bundle.checks.is_empty(), "{}", bundle.name);
        }
    }
}
