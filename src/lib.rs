//! Round-robin HTTP load balancer library

pub mod config;
pub mod http;
pub mod routing;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::LbConfig;
pub use http::HttpServer;
pub use load_balancer::ServerPool;
pub use routing::RequestRouter;
