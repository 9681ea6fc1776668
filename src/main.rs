//! Custody wallet service.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client
//!       │
//!       ▼
//!   ┌──────────────┐     ┌──────────────────┐
//!   │  http router │────▶│ transfer engine  │
//!   └──────┬───────┘     └──┬─────┬─────┬───┘
//!          │                │     │     │
//!          │        nonce/  │     │sign │ broadcast
//!          │        balance ▼     ▼     ▼
//!          │        ┌──────────┐ ┌────────┐
//!          └───────▶│ indexer  │ │ signer │
//!                   │  client  │ │ client │
//!                   └────┬─────┘ └────────┘
//!                        │ status polls
//!                   ┌────▼─────┐
//!                   │ monitor  │
//!                   │ registry │
//!                   └──────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use custody_wallet::config::load_config;
use custody_wallet::lifecycle::{shutdown_on_ctrl_c, Shutdown};
use custody_wallet::observability::{init_metrics, init_tracing};
use custody_wallet::WalletServer;

#[derive(Parser)]
#[command(name = "custody-wallet")]
#[command(about = "Custodial Stacks wallet API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    init_tracing(&config.observability.log_level);
    tracing::info!("custody-wallet v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        network = %config.network,
        indexer = %config.indexer.base_url,
        signer = %config.signer.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    let server = WalletServer::new(config, shutdown)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
