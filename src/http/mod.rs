//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (buffer body, prepare upstream request)
//!     → [routing::router dispatches over the pool]
//!     → response.rs (strip hop-by-hop headers, or fixed 503)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{BufferedRequest, X_REQUEST_ID};
pub use server::HttpServer;
