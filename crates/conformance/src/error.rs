//! Error types for conformance checks

use stowage_cache::CacheError;
use thiserror::Error;

/// Result of a single conformance check
pub type CheckResult = Result<(), ConformanceError>;

/// Why a single check failed
#[derive(Debug, Error)]
pub enum ConformanceError {
    /// Observed behaviour differs from the contract
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A cache operation failed where it should have succeeded
    #[error("unexpected cache error: {0}")]
    Cache(#[from] CacheError),

    /// The factory could not provide what the check needs
    #[error("factory cannot provide {0}")]
    Unavailable(&'static str),

    /// The check panicked
    #[error("check panicked: {0}")]
    Panicked(String),
}

/// A harness run with at least one failed check
#[derive(Debug, Error)]
#[error("{variant}: {failed} of {total} checks failed ({summary})")]
pub struct ConformanceFailure {
    /// Variant under test
    pub variant: &'static str,
    /// Failed check count
    pub failed: usize,
    /// Executed check count
    pub total: usize,
    /// `bundle::check` names of the failures
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_errors_convert() {
        let err: ConformanceError = CacheError::unsupported("lock_all", "LocalCache").into();
        assert!(matches!(err, ConformanceError::Cache(ref inner) if inner.is_unsupported()));
        assert!(err.to_string().starts_with("unexpected cache error"));
    }

    #[test]
    fn test_failure_display_names_checks() {
        let failure = ConformanceFailure {
            variant: "local",
            failed: 1,
            total: 20,
            summary: "loading::miss_loads_once".into(),
        };
        assert_eq!(failure.to_string(), "local: 1 of 20 checks failed (loading::miss_loads_once)");
    }
}
