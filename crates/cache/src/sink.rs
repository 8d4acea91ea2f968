//! Side channel for errors the engine has already handled
//!
//! The sink is invoked after an operation has decided its outcome. It sees
//! the error by reference and returns nothing, so it can neither veto nor
//! retry the operation; a panicking sink is contained.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, warn};

use crate::error::{CacheError, ErrorClassification, ErrorSeverity};

/// Engine operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Miss-triggered load
    Load,
    /// Caller write
    Put,
    /// Caller removal
    Remove,
    /// Policy-driven eviction
    Evict,
    /// TTL expiry
    Expire,
    /// Write-back or retry flush
    Flush,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Put => "put",
            Self::Remove => "remove",
            Self::Evict => "evict",
            Self::Expire => "expire",
            Self::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// Receiver of handled errors, for logging or monitoring
pub trait ErrorSink: Send + Sync {
    /// Observe an error raised while running `operation`
    fn report(&self, operation: Operation, error: &CacheError);
}

/// Default sink: structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, operation: Operation, err: &CacheError) {
        let severity = err.severity();
        if severity >= ErrorSeverity::Critical {
            error!(%operation, %severity, error = %err, "cache operation failed");
        } else {
            warn!(
                %operation,
                %severity,
                retryable = err.is_retryable(),
                error = %err,
                "cache operation failed"
            );
        }
    }
}

/// Deliver `err` to `sink`, swallowing any panic raised by the sink
pub(crate) fn deliver(sink: &dyn ErrorSink, operation: Operation, err: &CacheError) {
    if catch_unwind(AssertUnwindSafe(|| sink.report(operation, err))).is_err() {
        error!(%operation, "error sink panicked; report dropped");
    }
}
