//! mfe-router: micro-frontend dispatcher.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────── mfe-router ────────────────────────┐
//!                     │                                                            │
//!   Client request    │  ┌──────────────┐  /_next/*, /public/*  ┌──────────────┐    │
//!   ──────────────────┼─▶│     edge     │──────────────────────▶│ asset store  │    │
//!                     │  │ distribution │   (TTL cache)         └──────▲───────┘    │
//!                     │  └──────┬───────┘                              │ publish    │
//!                     │         │ everything else                      │            │
//!                     │         ▼                                      │            │
//!                     │  ┌──────────────┐  priority order      ┌───────┴──────┐     │
//!                     │  │    router    │─────────────────────▶│ page service │─────┼──▶ target
//!                     │  └──────▲───────┘                      └───────┬──────┘     │
//!                     │         │ register_route                       │            │
//!                     │         └──────────── handles from ◀───────────┘            │
//!                     │                   parameter registry                        │
//!                     └────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use mfe_router::config::{load_config, MfeConfig};
use mfe_router::lifecycle::shutdown_signal;
use mfe_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mfe-router", version, about = "Micro-frontend dispatcher")]
struct Args {
    /// TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, base_dir) = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            let base_dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, base_dir)
        }
        None => (MfeConfig::default(), PathBuf::from(".")),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        services = config.services.len(),
        "mfe-router starting"
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

    let app = mfe_router::start(&config, &base_dir).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining listeners");
    app.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
