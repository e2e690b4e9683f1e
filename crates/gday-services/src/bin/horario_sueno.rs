// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day sleep schedule service.
//!
//! Serves `/horario_sueno` and sends bedtime reminders.

use tracing::{info, warn};

use gday_services::{RunningService, ServiceConfig, ServiceKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gday_services=info,gday_jobs=info,gday_store=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = ServiceConfig::from_env(ServiceKind::SleepSchedules)?;

    info!(
        service = config.kind.name(),
        http_addr = %config.http_addr,
        database_url = %config.database_url,
        schedule = %config.schedule,
        "Starting sleep schedule service"
    );

    let service = RunningService::start(&config).await?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    service.shutdown().await;

    Ok(())
}
