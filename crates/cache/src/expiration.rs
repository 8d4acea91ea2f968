//! Time-to-live computation and the shared expiration predicate
//!
//! Lazy and eager enforcement both go through [`ExpirationController::is_expired`],
//! so an entry with TTL `t` inserted at `t0` is gone from `t0 + t` on
//! (inclusive) and visible at every earlier instant, whichever mode runs.

use std::time::{Duration, Instant};

use crate::config::ExpirationMode;

/// Computes expiration deadlines and decides freshness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationController {
    default_ttl: Option<Duration>,
    mode: ExpirationMode,
}

impl ExpirationController {
    /// Build a controller from the configured default TTL and mode
    pub fn new(default_ttl: Option<Duration>, mode: ExpirationMode) -> Self {
        Self { default_ttl, mode }
    }

    /// Absolute deadline for an entry written at `now`
    ///
    /// An explicit TTL wins over the default; no TTL at all means the entry
    /// never expires.
    pub fn deadline(&self, now: Instant, explicit: Option<Duration>) -> Option<Instant> {
        explicit.or(self.default_ttl).and_then(|ttl| now.checked_add(ttl))
    }

    /// True when `now` has reached `expires_at`
    pub fn is_expired(expires_at: Option<Instant>, now: Instant) -> bool {
        expires_at.is_some_and(|at| now >= at)
    }

    /// Interval of the background sweep, when eager mode is configured
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.mode {
            ExpirationMode::Lazy => None,
            ExpirationMode::Eager { interval } => Some(interval),
        }
    }

    /// Configured mode
    pub fn mode(&self) -> ExpirationMode {
        self.mode
    }

    /// Configured default TTL
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}
