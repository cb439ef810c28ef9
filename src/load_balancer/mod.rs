//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request dispatched
//!     → pool.rs (next alive backend)
//!     → round_robin.rs (atomic cursor picks the starting slot)
//!     → backend.rs (forward through the backend)
//!     → forward.rs (hyper client round trip)
//!     → Return backend response or transport error
//! ```
//!
//! # Design Decisions
//! - Backend list is fixed at startup; only alive flags change afterwards
//! - Dead backends are skipped during selection, never removed
//! - Selection takes no pool-wide lock

pub mod backend;
pub mod forward;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use forward::{ForwardError, Forwarder, HttpForwarder};
pub use pool::ServerPool;
