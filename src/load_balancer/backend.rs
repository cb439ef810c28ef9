//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track liveness (alive/dead)
//! - Probe reachability with a bare TCP connect
//! - Forward requests through the configured `Forwarder`

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use crate::http::request::BufferedRequest;
use crate::load_balancer::forward::{ForwardError, Forwarder};

/// How long a health probe may wait for the TCP handshake.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A backend address that cannot be used.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid backend URL {url:?}: {source}")]
    Parse {
        url: String,
        source: url::ParseError,
    },

    #[error("backend URL {0} has unsupported scheme {1:?} (only http is supported)")]
    UnsupportedScheme(String, String),

    #[error("backend URL {0} has no host")]
    MissingHost(String),
}

/// Parse a configured backend base URL.
pub fn parse_backend_url(raw: &str) -> Result<Url, AddressError> {
    let url = Url::parse(raw.trim()).map_err(|source| AddressError::Parse {
        url: raw.to_string(),
        source,
    })?;
    if url.scheme() != "http" {
        return Err(AddressError::UnsupportedScheme(raw.to_string(), url.scheme().to_string()));
    }
    if host_port(&url).is_none() {
        return Err(AddressError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// `host:port` of a URL, using the scheme's default port when none is given.
pub fn host_port(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    let port = url.port_or_known_default()?;
    Some(format!("{}:{}", host, port))
}

/// A single backend server.
pub struct Backend {
    /// Base URL requests are forwarded to. Also the backend's identity.
    address: Url,
    /// Pre-calculated `host:port` for probing.
    host_port: String,
    alive: RwLock<bool>,
    forwarder: Arc<dyn Forwarder>,
}

impl Backend {
    /// Create a new backend. Backends start out alive.
    pub fn new(address: Url, forwarder: Arc<dyn Forwarder>) -> Result<Self, AddressError> {
        let host_port =
            host_port(&address).ok_or_else(|| AddressError::MissingHost(address.to_string()))?;
        Ok(Self {
            address,
            host_port,
            alive: RwLock::new(true),
            forwarder,
        })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    pub fn set_alive(&self, alive: bool) {
        *self.alive.write().unwrap_or_else(PoisonError::into_inner) = alive;
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether a TCP connection to the backend can be opened.
    ///
    /// Leaves the alive flag alone; callers decide what to do with the result.
    pub async fn probe(&self) -> bool {
        match time::timeout(PROBE_TIMEOUT, TcpStream::connect(&self.host_port)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::warn!(backend = %self.address, error = %e, "Site unreachable");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %self.address, timeout = ?PROBE_TIMEOUT, "Site unreachable: probe timed out");
                false
            }
        }
    }

    /// Relay `request` to this backend.
    pub async fn forward(&self, request: &BufferedRequest) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(&self.address, request).await
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("address", &self.address.as_str())
            .field("alive", &self.is_alive())
            .finish()
    }
}
