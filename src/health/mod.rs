//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend (TCP connect)
//!     → Set alive flag
//!
//! Passive failure detection (routing::router):
//!     Retry budget spent on a backend
//!     → Mark it dead until the next successful sweep
//! ```
//!
//! # Design Decisions
//! - Probes are transport-level only, no application health endpoint
//! - Sweeps are sequential: worst case N × probe timeout
//! - Monitor never blocks request handling

pub mod active;

pub use active::HealthMonitor;
