//! simple-lb: a round-robin HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 LOAD BALANCER                │
//!     Client Request      │  ┌─────────┐    ┌──────────┐    ┌──────────┐ │
//!     ────────────────────┼─▶│  http   │───▶│ routing  │───▶│  server  │ │
//!                         │  │ server  │    │ dispatch │    │   pool   │ │
//!                         │  └─────────┘    └────┬─────┘    └────┬─────┘ │
//!                         │                      │ retry /       │       │
//!                         │                      │ failover      ▼       │
//!     Client Response     │  ┌─────────┐    ┌────┴─────┐    ┌──────────┐ │
//!     ◀───────────────────┼──│response │◀───│ backend  │◀───│ backend  │◀┼──── Backend
//!                         │  └─────────┘    │ forward  │    │ (alive?) │ │     Server
//!                         │                 └──────────┘    └────▲─────┘ │
//!                         │                                      │       │
//!                         │                 ┌──────────────┐     │       │
//!                         │                 │ health sweep │─────┘       │
//!                         │                 │  every 20s   │             │
//!                         │                 └──────────────┘             │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use simple_lb::config::loader::{find_config, read_config, ConfigError};
use simple_lb::config::validation::validate_config;
use simple_lb::config::watcher::{changed_sections, ConfigWatcher};
use simple_lb::config::LbConfig;
use simple_lb::http::HttpServer;
use simple_lb::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "simple-lb", version, about = "Round-robin HTTP load balancer")]
struct Cli {
    /// Config file (defaults to /etc/proxy/simple_lb/cfg.toml, then ./config/cfg.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated backend URLs; replaces `server.proxy_pass`
    #[arg(short, long, value_delimiter = ',')]
    backends: Vec<String>,

    /// Port to serve on; replaces `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config);
    let mut config = match &config_path {
        Some(path) => read_config(path)?,
        None => LbConfig::default(),
    };

    if !cli.backends.is_empty() {
        config.server.proxy_pass = cli.backends.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!(config = ?config_path, "simple-lb v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let server = HttpServer::new(&config)?;

    // Dropping the watcher stops it, so the guard lives as long as main.
    let _watcher_guard = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let running = config.clone();
            tokio::spawn(async move {
                while let Some(reloaded) = updates.recv().await {
                    let changed = changed_sections(&running, &reloaded);
                    if changed.is_empty() {
                        tracing::info!("Config reloaded without changes");
                    } else {
                        tracing::warn!(sections = ?changed, "Config changed, restart to apply");
                    }
                }
            });
            match watcher.run() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(config.server.listen_address()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        backends = server.pool().len(),
        "Load Balancer started"
    );

    server.run(listener).await?;
    Ok(())
}
