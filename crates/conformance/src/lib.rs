//! Conformance suite for stowage cache variants
//!
//! A [`CacheFactory`] describes a cache implementation: the capabilities it
//! declares and how to build a fresh instance from a [`Blueprint`]. The
//! [`Harness`] runs every applicable [`Bundle`] against it and collects a
//! [`ConformanceReport`].
//!
//! Bundles are independent. Each check builds its own cache, loader and
//! store, so no state leaks between checks or bundles. Capabilities gate
//! bundles in one of two ways:
//!
//! - optional features (loading, storing, expiration, entry views) are
//!   skipped when undeclared;
//! - locking bundles always run, and verify that an undeclared lock is
//!   rejected with [`CacheError::UnsupportedOperation`](stowage_cache::CacheError).
//!
//! ```no_run
//! use stowage_conformance::{Harness, LocalFactory};
//!
//! let report = Harness::new(&LocalFactory).run();
//! report.assert_passed().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

/// Fail the current check unless `cond` holds
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::ConformanceError::Assertion(format!($($arg)+)));
        }
    };
}

/// Fail the current check unless both sides are equal
macro_rules! ensure_eq {
    ($left:expr, $right:expr, $what:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            return Err($crate::error::ConformanceError::Assertion(format!(
                "{}: expected {:?}, got {:?}",
                $what, right, left
            )));
        }
    }};
}

pub mod bundles;
pub mod error;
pub mod factory;
pub mod fixtures;
pub mod harness;

pub use bundles::{Bundle, Check};
pub use error::{CheckResult, ConformanceError, ConformanceFailure};
pub use factory::{Blueprint, CacheFactory, LocalFactory, SharedCache, SharedFactory, TestCache};
pub use fixtures::{RecordingLoader, RecordingStore, StoreCall};
pub use harness::{BundleOutcome, BundleReport, CheckFailure, ConformanceReport, Harness};
