//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Start the health monitor alongside the listener
//! - Buffer each request and hand it to the request router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::LbConfig;
use crate::health::HealthMonitor;
use crate::http::request::{BufferedRequest, X_REQUEST_ID};
use crate::load_balancer::{backend::AddressError, HttpForwarder, ServerPool};
use crate::observability::metrics;
use crate::routing::RequestRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub max_request_bytes: usize,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Create a server forwarding to the backends in `config`.
    pub fn new(config: &LbConfig) -> Result<Self, AddressError> {
        let forwarder = Arc::new(HttpForwarder::from_config(config));
        let pool = Arc::new(ServerPool::from_config(config, forwarder)?);
        Ok(Self::from_pool(pool, config.limits.max_request_bytes))
    }

    /// Create a server over an already built pool.
    pub fn from_pool(pool: Arc<ServerPool>, max_request_bytes: usize) -> Self {
        let state = AppState {
            router: Arc::new(RequestRouter::new(pool.clone())),
            max_request_bytes,
        };
        Self {
            router: Self::build_router(state),
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Start the health monitor and serve connections from `listener`.
    ///
    /// Runs until the listener fails; there is no shutdown path.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        HealthMonitor::new(self.pool.clone()).spawn();

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Buffers the request and dispatches it over the pool.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();

    let span = tracing::info_span!(
        "dispatch",
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        client = %client_addr,
    );

    async move {
        let buffered = match BufferedRequest::from_request(request, Some(client_addr), state.max_request_bytes).await {
            Ok(buffered) => buffered,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request");
                let response = e.into_response();
                metrics::record_request(method.as_str(), response.status().as_u16(), "none", start_time);
                return response;
            }
        };

        match state.router.dispatch(&buffered).await {
            Ok(routed) => {
                metrics::record_request(
                    method.as_str(),
                    routed.response.status().as_u16(),
                    routed.backend.address().as_str(),
                    start_time,
                );
                routed.response
            }
            Err(error) => {
                tracing::warn!(error = %error, "Service not available, terminating");
                let response = error.into_response();
                metrics::record_request(method.as_str(), response.status().as_u16(), "none", start_time);
                response
            }
        }
    }
    .instrument(span)
    .await
}
