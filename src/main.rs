//! Card bridge
//!
//! Watches the card contract, tokenizes encrypted cards, charges them through
//! the processor and writes settlement back on-chain.
//!
//! # Architecture Overview
//!
//! ```text
//!     chain logs ──▶ ingestion ──▶ queue ──▶ dispatcher ──▶ handlers
//!                        │                                   │  │  │
//!                        ▼                                   │  │  ▼
//!                   vault (checkpoint)          vault (tokens) │ processor API
//!                                                              ▼
//!                                              gateway ──▶ contract calls
//!                                                 ▲
//!                                   monitors ─────┘ (processing charges)
//! ```

use clap::Parser;
use std::path::PathBuf;

use card_bridge::config::load_config;
use card_bridge::lifecycle::{build_bridge, wait_for_signal, Shutdown};
use card_bridge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "card-bridge")]
#[command(about = "Bridge between the card contract and the card processor", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "card-bridge starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bridge = build_bridge(config).await?;
    bridge.verify_backend_key().await;

    let shutdown = Shutdown::new();
    let running = bridge.start(&shutdown).await?;

    wait_for_signal().await;
    running.stop().await?;
    Ok(())
}
