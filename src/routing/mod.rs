//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Buffered inbound request
//!     → router.rs (pick peer, forward, retry, fail over)
//!     → Backend response, or
//!     → error.rs (terminal DispatchError → 503)
//! ```
//!
//! # Design Decisions
//! - Retry/failover is one explicit loop, never handler re-entry
//! - Per-request budget travels as a plain value
//! - A response is only committed once a backend has fully answered

pub mod error;
pub mod router;

pub use error::DispatchError;
pub use router::{RequestRouter, Routed};
