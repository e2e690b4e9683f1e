// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::{KNOWN_SERVICES, RegistryError, ServiceRegistry};

/// Public port when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 3001;

/// Outbound timeout when `GATEWAY_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Public listen address.
    pub http_addr: SocketAddr,
    /// Timeout of each forwarded request.
    pub timeout: Duration,
    /// Routed services.
    pub registry: ServiceRegistry,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Workspace binaries are looked up next to the running executable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bin_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::from_lookup(|key| std::env::var(key).ok(), bin_dir)
    }

    /// Load configuration through `lookup`, resolving default entry points in
    /// `bin_dir`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        bin_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
            None => DEFAULT_PORT,
        };

        let timeout_secs: u64 = match lookup("GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let entries = KNOWN_SERVICES
            .iter()
            .map(|service| service.entry(&lookup, bin_dir.as_deref()))
            .collect();
        let registry = ServiceRegistry::new(entries)?;

        Ok(Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs),
            registry,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `PORT` is not a port number.
    #[error("Invalid port number in PORT")]
    InvalidPort,
    /// `GATEWAY_TIMEOUT_SECS` is not a positive integer.
    #[error("Invalid timeout in GATEWAY_TIMEOUT_SECS")]
    InvalidTimeout,
    /// The service table is inconsistent.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
