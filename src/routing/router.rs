//! Request dispatch with retry and failover.
//!
//! # Responsibilities
//! - Pick a peer from the pool for each inbound request
//! - Retry the same peer on transport failure, with a fixed backoff
//! - Mark a peer dead once its retry budget is spent and fail over
//! - Stop after the attempt budget, or when no peer is alive
//! - Stop on a peer that answered unusably, leaving its liveness alone
//!
//! # State Machine
//! ```text
//! Dispatching → Forwarding → Success
//!                          → RetrySamePeer    → Forwarding
//!                          → FailoverNextPeer → Dispatching
//! Dispatching → Exhausted (attempts > MAX_ATTEMPTS or no alive peer)
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;
use tokio::time;

use crate::http::request::BufferedRequest;
use crate::load_balancer::{Backend, ForwardError, ServerPool};
use crate::observability::metrics;
use crate::resilience::{DispatchState, MAX_ATTEMPTS, RETRY_BACKOFF};
use crate::routing::error::DispatchError;

/// A request that some backend answered.
#[derive(Debug)]
pub struct Routed {
    pub response: Response<Body>,
    /// Backend that produced `response`.
    pub backend: Arc<Backend>,
    /// Budget position when the response arrived.
    pub state: DispatchState,
}

enum PeerOutcome {
    Served(Response<Body>, DispatchState),
    Rejected(ForwardError),
    Exhausted(DispatchState),
}

/// Dispatches requests over a shared [`ServerPool`].
#[derive(Debug, Clone)]
pub struct RequestRouter {
    pool: Arc<ServerPool>,
}

impl RequestRouter {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Forward `request` until a backend answers or the budget runs out.
    ///
    /// Errors returned here are always terminal.
    pub async fn dispatch(&self, request: &BufferedRequest) -> Result<Routed, DispatchError> {
        let mut state = DispatchState::new();

        loop {
            if state.attempts_exhausted() {
                return Err(DispatchError::AttemptBudgetExhausted {
                    attempts: MAX_ATTEMPTS,
                });
            }

            let peer = self
                .pool
                .next_peer()
                .ok_or(DispatchError::NoBackendAvailable)?;
            tracing::debug!(backend = %peer.address(), attempt = state.attempts, "Selected peer");

            match self.forward_with_retries(&peer, request, state).await {
                PeerOutcome::Served(response, state) => {
                    return Ok(Routed {
                        response,
                        backend: peer,
                        state,
                    });
                }
                PeerOutcome::Rejected(source) => {
                    let error = DispatchError::ResponseRejected {
                        backend: peer.address().to_string(),
                        source,
                    };
                    tracing::warn!(error = %error, "Backend response rejected");
                    return Err(error);
                }
                PeerOutcome::Exhausted(exhausted) => {
                    let error = DispatchError::RetryBudgetExhausted {
                        backend: peer.address().to_string(),
                        retries: exhausted.retries,
                    };
                    tracing::warn!(error = %error, attempt = exhausted.attempts, "Marking backend down, failing over");

                    self.pool.mark_backend_status(peer.address(), false);
                    metrics::record_failover(peer.address().as_str());
                    state = exhausted.failover();
                }
            }
        }
    }

    async fn forward_with_retries(
        &self,
        peer: &Backend,
        request: &BufferedRequest,
        mut state: DispatchState,
    ) -> PeerOutcome {
        loop {
            match peer.forward(request).await {
                Ok(response) => return PeerOutcome::Served(response, state),
                Err(source) if !source.is_retryable() => return PeerOutcome::Rejected(source),
                Err(source) => {
                    let error = DispatchError::BackendUnreachable {
                        backend: peer.address().to_string(),
                        source,
                    };
                    tracing::warn!(error = %error, attempt = state.attempts, retry = state.retries, "Forward failed");

                    if !state.can_retry() {
                        return PeerOutcome::Exhausted(state);
                    }
                    time::sleep(RETRY_BACKOFF).await;
                    metrics::record_retry(peer.address().as_str());
                    state = state.retry();
                }
            }
        }
    }
}
