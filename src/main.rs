//! Contextual Replacement Reverse Proxy
//!
//! A rewriting gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                CONTEXTUAL PROXY                     │
//!                    │                                                     │
//!   Client Request   │  ┌─────────┐    ┌──────────┐    ┌──────────────┐   │
//!   ─────────────────┼─▶│  http   │───▶│ classify │───▶│ rules chain  │   │
//!                    │  │ server  │    │(session) │    │ (first match)│   │
//!                    │  └────┬────┘    └──────────┘    └──────┬───────┘   │
//!                    │       │                                │           │
//!                    │       ▼                                ▼           │
//!                    │  ┌─────────┐                    ┌──────────────┐   │
//!                    │  │upstream │                    │  rule store  │   │
//!                    │  │ forward │                    │  (DashMap)   │   │
//!                    │  └────┬────┘                    └──────────────┘   │
//!                    │       │                                            │
//!   Client Response  │  ┌────▼────┐    ┌──────────────┐                   │
//!   ◀────────────────┼──│ rewrite │◀───│ tag registry │                   │
//!                    │  │  (HTML) │    │ (TTL cache)  │                   │
//!                    │  └─────────┘    └──────────────┘                   │
//!                    │                                                     │
//!                    │  Cross-cutting: config, admin API, observability    │
//!                    └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use contextual_proxy::config::{load_config, ContextualConfig};
use contextual_proxy::http::HttpServer;
use contextual_proxy::observability::{logging, metrics};
use contextual_proxy::store::MemoryStore;

#[derive(Parser)]
#[command(name = "contextual-proxy")]
#[command(about = "Contextual replacement reverse proxy", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Stock defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ContextualConfig::stock(),
    };

    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        tests = config.tests.len(),
        tag_ttl_secs = config.replacement.tag_ttl_secs,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let store = Arc::new(MemoryStore::new());
    let server = HttpServer::new(config, store)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
