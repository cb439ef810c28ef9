//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every backend must be a usable http base URL, listed once
//! - Validate value ranges (timeouts > 0, limits > 0, port valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::LbConfig;
use crate::load_balancer::backend::parse_backend_url;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured (server.proxy_pass is empty)")]
    NoBackends,

    #[error("server.proxy_pass[{index}]: {reason}")]
    InvalidBackend { index: usize, reason: String },

    #[error("backend {0} is listed more than once")]
    DuplicateBackend(String),

    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.proxy_pass.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for (index, raw) in config.server.proxy_pass.iter().enumerate() {
        match parse_backend_url(raw) {
            Ok(url) => {
                if !seen.insert(url.to_string()) {
                    errors.push(ValidationError::DuplicateBackend(raw.clone()));
                }
            }
            Err(e) => errors.push(ValidationError::InvalidBackend {
                index,
                reason: e.to_string(),
            }),
        }
    }

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    let zero = [
        ("timeouts.connect_secs", config.timeouts.connect_secs == 0),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs == 0),
        ("limits.max_request_bytes", config.limits.max_request_bytes == 0),
        ("limits.max_response_bytes", config.limits.max_response_bytes == 0),
    ];
    for (name, is_zero) in zero {
        if is_zero {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
