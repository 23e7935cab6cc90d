//! API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                     API GATEWAY                      │
//!                          │                                                      │
//!     Client Request       │  ┌─────────┐    ┌──────────┐    ┌────────────────┐   │
//!     ─────────────────────┼─▶│  http   │───▶│ routing  │───▶│   dispatch     │───┼──▶ Service
//!                          │  │ server  │    │  table   │    │ retry + breaker│   │    Instances
//!                          │  └────┬────┘    └──────────┘    └───────┬────────┘   │
//!                          │       │ /api/execute_saga               │            │
//!                          │       ▼                                 ▼            │
//!                          │  ┌─────────┐                    ┌───────────────┐    │
//!                          │  │  saga   │───────────────────▶│ load_balancer │    │
//!                          │  │  plan   │   steps dispatch   │  round robin  │    │
//!                          │  └─────────┘                    └───────┬───────┘    │
//!                          │                                         │ reads      │
//!                          │                                 ┌───────▼───────┐    │
//!                          │                                 │   discovery   │◀───┼─── Consul
//!                          │                                 │ cache+refresh │    │
//!                          │                                 └───────────────┘    │
//!                          │  config · observability · lifecycle · resilience     │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use api_gateway::config::{self, watcher::ConfigWatcher, GatewayConfig};
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway with circuit breaking, load balancing and sagas", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        registry = ?config.registry.kind,
        services = ?config.service_names(),
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let live_config = config::live(config);
    let shutdown = Shutdown::new();

    // The watcher stops when dropped, so it is held until main returns.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => {
                    tokio::spawn(config::watcher::apply_updates(
                        live_config.clone(),
                        updates,
                        shutdown.subscribe(),
                    ));
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = GatewayServer::new(live_config)?;
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
