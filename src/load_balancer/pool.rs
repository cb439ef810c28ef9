//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the ordered backend list built at startup
//! - Select the next alive backend in round-robin order
//! - Apply liveness changes from failover and health sweeps

use std::sync::Arc;

use url::Url;

use crate::config::LbConfig;
use crate::load_balancer::{
    backend::{parse_backend_url, AddressError, Backend},
    forward::Forwarder,
    round_robin::RoundRobin,
};
use crate::observability::metrics;

/// Ordered set of backends plus the shared round-robin cursor.
///
/// Backends are added through `&mut self` before the pool is wrapped in an
/// `Arc`; afterwards only their alive flags and the cursor change.
#[derive(Debug, Default)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    cursor: RoundRobin,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from `server.proxy_pass`, in configured order.
    pub fn from_config(
        config: &LbConfig,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, AddressError> {
        let mut pool = Self::new();
        for raw in &config.server.proxy_pass {
            let address = parse_backend_url(raw)?;
            tracing::info!(backend = %address, "Configured server");
            pool.add_backend(Backend::new(address, forwarder.clone())?);
        }
        Ok(pool)
    }

    pub fn add_backend(&mut self, backend: Backend) {
        self.backends.push(Arc::new(backend));
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Advance the cursor and return the slot it lands on.
    pub fn next_index(&self) -> Option<usize> {
        if self.backends.is_empty() {
            return None;
        }
        Some(self.cursor.next_index(self.backends.len()))
    }

    /// Pick the next alive backend, scanning each slot at most once.
    pub fn next_peer(&self) -> Option<Arc<Backend>> {
        let next = self.next_index()?;
        let len = self.backends.len();

        for offset in 0..len {
            let index = (next + offset) % len;
            let backend = &self.backends[index];
            if backend.is_alive() {
                if offset != 0 {
                    // Skip the dead slots on the next call too.
                    self.cursor.resume_after(index);
                }
                return Some(backend.clone());
            }
        }

        tracing::debug!(backend_count = len, "No alive backends in pool");
        None
    }

    /// Set the liveness of the backend at `address`. Unknown addresses are ignored.
    pub fn mark_backend_status(&self, address: &Url, alive: bool) {
        if let Some(backend) = self.backends.iter().find(|b| b.address() == address) {
            backend.set_alive(alive);
            metrics::record_backend_health(backend.address().as_str(), alive);
        }
    }

    /// Probe every backend in order and record the result.
    pub async fn health_sweep(&self) {
        for backend in &self.backends {
            let alive = backend.probe().await;
            let was_alive = backend.is_alive();
            backend.set_alive(alive);

            let status = if alive { "up" } else { "down" };
            tracing::info!(
                backend = %backend.address(),
                status,
                changed = alive != was_alive,
                "{} [{}]",
                backend.address(),
                status
            );
            metrics::record_backend_health(backend.address().as_str(), alive);
        }
    }
}
