//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend liveness based on results

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::load_balancer::ServerPool;

/// Time between two health sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(20);

/// Background task running a health sweep every [`SWEEP_INTERVAL`].
pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self {
            pool,
            interval: SWEEP_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_interval(pool: Arc<ServerPool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// Run the monitor on the current runtime for the rest of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sweep forever. The first sweep happens one interval after start.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        // A slow sweep delays the next one instead of triggering a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::info!("Starting health check...");
            self.pool.health_sweep().await;
            tracing::info!("Health check completed");
        }
    }
}
