//! Dispatch error kinds.

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::{bad_gateway, service_unavailable};
use crate::load_balancer::ForwardError;

/// Outcomes of dispatch that are not a backend response.
///
/// `BackendUnreachable` and `RetryBudgetExhausted` are handled inside the
/// router by retrying or failing over; the other kinds end a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A single forward failed.
    #[error("backend {backend} unreachable: {source}")]
    BackendUnreachable {
        backend: String,
        source: ForwardError,
    },

    /// A backend answered, but its response cannot be relayed.
    #[error("backend {backend} response rejected: {source}")]
    ResponseRejected {
        backend: String,
        source: ForwardError,
    },

    /// No alive backend left in the pool.
    #[error("no backend available")]
    NoBackendAvailable,

    /// A backend kept failing after every allowed retry.
    #[error("backend {backend} failed after {retries} retries")]
    RetryBudgetExhausted { backend: String, retries: u32 },

    /// Every allowed backend hop failed.
    #[error("max attempts reached ({attempts})")]
    AttemptBudgetExhausted { attempts: u32 },
}

impl DispatchError {
    /// True for the kinds that are reported to the client.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchError::NoBackendAvailable
                | DispatchError::AttemptBudgetExhausted { .. }
                | DispatchError::ResponseRejected { .. }
        )
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            DispatchError::ResponseRejected { .. } => bad_gateway(),
            _ => service_unavailable(),
        }
    }
}
