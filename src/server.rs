//! TCP accept loop
//!
//! Spawns one handler task per incoming connection. A failing connection
//! is logged and never affects the loop or other connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::hub::HubHandle;

/// Accept connections forever
pub async fn serve(listener: TcpListener, hub: HubHandle, config: Arc<Config>) {
    if let Ok(addr) = listener.local_addr() {
        info!("Poker hub listening on ws://{}{}", addr, config.path);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let hub = hub.clone();
                let config = config.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    match handle_connection(stream, hub, config).await {
                        Ok(()) | Err(AppError::Rejected(_)) => {}
                        Err(e) => error!("Connection handler error: {}", e),
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
