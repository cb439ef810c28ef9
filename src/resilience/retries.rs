//! Retry and failover budget.
//!
//! # Responsibilities
//! - Fix the per-request retry/attempt limits and the retry backoff
//! - Track where a single request is within its budget
//!
//! # Design Decisions
//! - Budget is per request, never shared between requests
//! - Only transport failures consume budget; any HTTP response is final
//! - A backend is marked dead only after its local retry budget is spent

use std::time::Duration;

/// Maximum same-backend retries after the first failed forward.
pub const MAX_RETRIES: u32 = 3;

/// Maximum distinct backends tried for one request.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between two forwards to the same backend.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Upper bound on forwards a single request can cause.
pub const MAX_FORWARDS_PER_REQUEST: u32 = MAX_ATTEMPTS * (MAX_RETRIES + 1);

/// Position of one request within its retry/failover budget.
///
/// Plain value: every transition returns a new state instead of mutating
/// shared request metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchState {
    /// Distinct backends tried so far, starting at 1.
    pub attempts: u32,
    /// Retries against the current backend, starting at 0.
    pub retries: u32,
}

impl DispatchState {
    /// State of a freshly received request.
    pub fn new() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }

    /// True once every allowed backend hop has been used.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts > MAX_ATTEMPTS
    }

    /// True while the current backend may still be retried.
    pub fn can_retry(&self) -> bool {
        self.retries < MAX_RETRIES
    }

    /// Another try against the same backend.
    pub fn retry(self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self
        }
    }

    /// Give up on the current backend and move to a new one.
    pub fn failover(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            retries: 0,
        }
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}
