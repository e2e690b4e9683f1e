// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day Gateway - single public entry point for the backend services.
//!
//! The gateway forwards each configured path prefix to its backend and
//! supervises the backend processes it is configured to launch.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `GatewayConfig` from environment variables |
//! | [`registry`] | `ServiceRegistry`, prefix to base URL and entry point |
//! | [`proxy`] | axum router forwarding requests through `reqwest` |
//! | [`supervisor`] | `Supervisor` launching and watching backend processes |
//!
//! Transport failures are answered with `500 {"message": "Error en el Gateway"}`.

#![deny(missing_docs)]

/// Gateway configuration.
pub mod config;

/// Forwarding errors.
pub mod error;

/// Request router.
pub mod proxy;

/// Service registry.
pub mod registry;

/// Backend process supervisor.
pub mod supervisor;

pub use config::{ConfigError, GatewayConfig};
pub use error::{GATEWAY_ERROR_MESSAGE, ProxyError};
pub use registry::{EntryPoint, RegistryError, ServiceEntry, ServiceRegistry};
pub use supervisor::{ProcessHandle, ServiceState, Supervisor};
