// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day gateway.
//!
//! Launches the backend services and forwards requests to them on one port.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use gday_gateway::supervisor::ProcessLauncher;
use gday_gateway::{GatewayConfig, Supervisor, proxy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gday_gateway=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = GatewayConfig::from_env()?;

    info!(
        http_addr = %config.http_addr,
        timeout_secs = config.timeout.as_secs(),
        services = config.registry.entries().len(),
        "Starting G-Day gateway"
    );
    for entry in config.registry.entries() {
        info!(service = %entry.name, prefix = %entry.prefix, base_url = %entry.base_url, "Route");
    }

    let supervisor = Supervisor::new(Arc::new(ProcessLauncher::new()));
    let started = supervisor.start_all(&config.registry).await;
    info!(started, "Backend services launched");

    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    let app = proxy::router(&config.registry, client);

    let listener = TcpListener::bind(config.http_addr).await?;
    info!("Gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // Wait for shutdown signal
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    supervisor.shutdown().await;

    Ok(())
}
