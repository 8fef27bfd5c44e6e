//! Ratecast Gateway Binary
//!
//! Serves cached exchange rates, refreshing them from the upstream provider.

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratecast_gateway::{Gateway, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratecast gateway");

    // Load configuration
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    let addr = config.socket_addr()?;

    let gateway = Gateway::new(config)?;
    gateway.start().await;

    let listener = TcpListener::bind(addr).await?;
    gateway.serve(listener, shutdown_signal()).await?;

    gateway.stop().await;
    info!("Ratecast gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Shutdown signal received");
}
