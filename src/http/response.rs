//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform a buffered backend response for the client
//! - Build the fixed response for requests no backend could serve
//!
//! # Design Decisions
//! - Backend responses are fully buffered before anything is sent, so a
//!   backend failing mid-body never yields a truncated client response
//! - Hop-by-hop headers stripped automatically

use axum::{
    body::{Body, Bytes},
    http::{response::Parts, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::strip_hop_by_hop;

/// Body of the terminal 503 response.
pub const UNAVAILABLE_MESSAGE: &str = "Service not available";

/// Body of the 502 sent when a backend response cannot be relayed.
pub const BAD_GATEWAY_MESSAGE: &str = "Bad gateway";

/// Rebuild a backend response from its head and fully-read body.
pub fn from_upstream(mut parts: Parts, body: Bytes) -> Response {
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::from(body))
}

/// Fixed response sent when dispatch ends without a backend response.
pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE).into_response()
}

/// Response for a backend answer that cannot be relayed, such as one over the size limit.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, BAD_GATEWAY_MESSAGE).into_response()
}
