// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launcher trait definitions.
//!
//! A launcher turns an entry point into a running child. The supervisor only
//! talks to these traits, so tests can swap in the mock launcher.

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::EntryPoint;

/// Errors from launcher operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The process could not be spawned.
    #[error("Failed to spawn {service}: {source}")]
    Spawn {
        /// Service name.
        service: String,
        /// Spawn error.
        source: std::io::Error,
    },

    /// The service is already supervised.
    #[error("Service already started: {0}")]
    AlreadyStarted(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for launcher operations.
pub type Result<T> = std::result::Result<T, LaunchError>;

/// A launched child process.
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Wait for the child to exit. `None` when it was ended by a signal.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Kill the child and reap it.
    async fn kill(&mut self);
}

/// Trait for process launchers.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launcher type identifier (e.g., "process", "mock").
    fn launcher_type(&self) -> &'static str;

    /// Launch `entry_point` for `service` without waiting for it.
    async fn launch(&self, service: &str, entry_point: &EntryPoint)
    -> Result<Box<dyn ChildProcess>>;
}
