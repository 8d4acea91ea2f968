//! Error types for the cache engine
//!
//! The engine distinguishes collaborator failures (loader and store), policy
//! precondition violations, configuration mistakes and operations a cache
//! variant does not implement. Every error type classifies itself through
//! [`ErrorClassification`] so error sinks can route by severity.
//!
//! A load that completes after its key was removed or overwritten is not an
//! error: the result is discarded and counted as a stale load.

use std::fmt;

use thiserror::Error;

/// Result type for cache engine operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for replacement policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors surfaced by cache engine operations
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Load failed for key {key}: {source}")]
    LoadFailure {
        key: String,
        #[source]
        source: LoadError,
    },

    #[error("Store failed for key {key}: {source}")]
    StoreFailure {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Capacity violation: {0}")]
    CapacityViolation(String),

    #[error("Unsupported operation: {operation} is not available on {variant}")]
    UnsupportedOperation { operation: &'static str, variant: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl CacheError {
    /// Build a load failure for the given key
    pub fn load_failure(key: impl fmt::Debug, source: LoadError) -> Self {
        Self::LoadFailure { key: format!("{key:?}"), source }
    }

    /// Build a store failure for the given key
    pub fn store_failure(key: impl fmt::Debug, source: StoreError) -> Self {
        Self::StoreFailure { key: format!("{key:?}"), source }
    }

    /// Build an unsupported-operation error
    pub fn unsupported(operation: &'static str, variant: &'static str) -> Self {
        Self::UnsupportedOperation { operation, variant }
    }

    /// Returns true for [`CacheError::UnsupportedOperation`]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }
}

/// Failure reported by a [`Loader`](crate::bridge::Loader)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("backing source unavailable: {0}")]
    Unavailable(String),

    #[error("loader rejected key: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

impl LoadError {
    /// Convenience constructor for ad-hoc loader failures
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Failure reported by a [`Store`](crate::bridge::Store)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Convenience constructor for ad-hoc store failures
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Precondition violations raised by a replacement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy is empty, nothing to evict")]
    Empty,

    #[error("key was never added to the policy")]
    UnknownKey,

    #[error("key is already tracked by the policy")]
    DuplicateKey,
}

/// Classification interface shared by every error type in this crate
pub trait ErrorClassification {
    /// Check if the failed operation may succeed when attempted again
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this error indicates broken internal state
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for LoadError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unavailable(_) => ErrorSeverity::Warning,
            Self::Rejected(_) | Self::Other(_) => ErrorSeverity::Error,
        }
    }
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unavailable(_) => ErrorSeverity::Warning,
            Self::Rejected(_) | Self::Other(_) => ErrorSeverity::Error,
        }
    }
}

impl ErrorClassification for PolicyError {
    fn is_retryable(&self) -> bool {
        false
    }

    // A policy that disagrees with the entry store means the two diverged.
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::LoadFailure { source, .. } => source.is_retryable(),
            Self::StoreFailure { source, .. } => source.is_retryable(),
            Self::CapacityViolation(_)
            | Self::UnsupportedOperation { .. }
            | Self::InvalidConfig(_)
            | Self::Policy(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::LoadFailure { source, .. } => source.severity(),
            Self::StoreFailure { source, .. } => source.severity(),
            Self::CapacityViolation(_) | Self::InvalidConfig(_) => ErrorSeverity::Error,
            Self::UnsupportedOperation { .. } => ErrorSeverity::Info,
            Self::Policy(err) => err.severity(),
        }
    }
}
