//! Forwarding requests to a backend.
//!
//! # Responsibilities
//! - Define the `Forwarder` seam every backend forwards through
//! - Provide the hyper-based forwarder used in production
//!
//! # Design Decisions
//! - Transport failures are returned as values; the router decides retry vs. failover
//! - Any HTTP response, whatever its status, counts as success
//! - The response body is read completely inside the forward, so a body
//!   failure is still a retryable transport failure
//! - A response over the size limit is not a transport failure: the backend
//!   answered, so it is neither retried nor marked down

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;
use url::Url;

use crate::config::LbConfig;
use crate::http::request::{collect_body, BufferedRequest, CollectError};
use crate::http::response;

/// Why a single forward to a backend failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream request could not be built.
    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    /// Connecting, sending, or reading the response head failed.
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    /// The response body failed before it was complete.
    #[error("failed to read upstream response body: {0}")]
    Body(#[source] axum::Error),

    /// The response body is larger than the configured limit.
    #[error("upstream response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The whole forward took longer than allowed.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// Whether another forward to the same backend could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ForwardError::ResponseTooLarge { .. })
    }
}

/// Future returned by [`Forwarder::forward`].
pub type ForwardFuture<'a> = BoxFuture<'a, Result<Response<Body>, ForwardError>>;

/// Relays a buffered request to a backend base URL.
pub trait Forwarder: Send + Sync + fmt::Debug {
    fn forward<'a>(&'a self, target: &'a Url, request: &'a BufferedRequest) -> ForwardFuture<'a>;
}

/// Forwarder backed by a pooled hyper client shared by all backends.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpForwarder {
    pub fn new(connect_timeout: Duration, timeout: Duration, max_response_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            timeout,
            max_response_bytes,
        }
    }

    pub fn from_config(config: &LbConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.upstream_secs),
            config.limits.max_response_bytes,
        )
    }

    async fn round_trip(
        &self,
        target: &Url,
        request: &BufferedRequest,
    ) -> Result<Response<Body>, ForwardError> {
        let upstream = request.to_upstream(target)?;
        let response: Response<Incoming> = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        let limit = self.max_response_bytes;
        let body = collect_body(Body::new(body), limit).await.map_err(|e| match e {
            CollectError::TooLarge => ForwardError::ResponseTooLarge { limit },
            CollectError::Read(e) => ForwardError::Body(e),
        })?;
        Ok(response::from_upstream(parts, body))
    }
}

impl Forwarder for HttpForwarder {
    fn forward<'a>(&'a self, target: &'a Url, request: &'a BufferedRequest) -> ForwardFuture<'a> {
        Box::pin(async move {
            match time::timeout(self.timeout, self.round_trip(target, request)).await {
                Ok(result) => result,
                Err(_) => Err(ForwardError::Timeout(self.timeout)),
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted forwarder for exercising the pool and router without sockets.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// Answers with the target's `host:port` as body, fails for targets
    /// switched to failing, and answers too large for rejected targets.
    #[derive(Debug, Default)]
    pub struct ScriptedForwarder {
        failing: Mutex<HashSet<String>>,
        oversized: Mutex<HashSet<String>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedForwarder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail(&self, host_port: &str) {
            self.failing.lock().unwrap().insert(host_port.to_string());
        }

        pub fn oversize(&self, host_port: &str) {
            self.oversized.lock().unwrap().insert(host_port.to_string());
        }

        pub fn calls(&self, host_port: &str) -> usize {
            self.calls.lock().unwrap().get(host_port).copied().unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    impl Forwarder for ScriptedForwarder {
        fn forward<'a>(&'a self, target: &'a Url, _request: &'a BufferedRequest) -> ForwardFuture<'a> {
            let key = crate::load_balancer::backend::host_port(target).unwrap_or_default();
            *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
            let failing = self.failing.lock().unwrap().contains(&key);
            let oversized = self.oversized.lock().unwrap().contains(&key);

            Box::pin(async move {
                if failing {
                    Err(ForwardError::Timeout(Duration::ZERO))
                } else if oversized {
                    Err(ForwardError::ResponseTooLarge { limit: 0 })
                } else {
                    Ok(Response::new(Body::from(key)))
                }
            })
        }
    }

    /// Read a response body as text.
    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
