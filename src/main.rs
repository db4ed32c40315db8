//! Planning Poker Hub - Entry Point
//!
//! Loads configuration, starts the Hub actor and accepts connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use poker_hub::{serve, Config, Hub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=poker_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("poker_hub=info")),
        )
        .init();

    // Bind address from the command line, then POKER_HUB_* variables
    let config = Arc::new(Config::from_env()?);

    let listener = TcpListener::bind(&config.addr).await?;

    let hub = Hub::spawn(config.hub_channel_capacity);
    info!("Hub actor started");

    serve(listener, hub, config).await;

    Ok(())
}
