//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forward to backend fails:
//!     → retries.rs (retry same backend after fixed backoff)
//!     → budget spent: mark backend dead, fail over to next peer
//!     → attempts spent: terminal 503
//! ```
//!
//! # Design Decisions
//! - Every request terminates: at most MAX_ATTEMPTS × (MAX_RETRIES + 1) forwards
//! - Limits are constants, not configuration
//! - Backoff is a timer await, never a blocking sleep

pub mod retries;

pub use retries::{DispatchState, MAX_ATTEMPTS, MAX_RETRIES, RETRY_BACKOFF};
