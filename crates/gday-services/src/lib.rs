// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day Services - backend HTTP services that host the scheduled jobs.
//!
//! Each service is its own binary, listens on its own port and shares the
//! document store with the jobs it runs.
//!
//! | Binary | Routes | Job |
//! |--------|--------|-----|
//! | `gday-notificaciones` | `/notificaciones/...` | [`gday_jobs::ActivityNotificationJob`] |
//! | `gday-reportes` | `/reportes/...` | [`gday_jobs::WeeklyReportJob`] |
//! | `gday-horario-sueno` | `/horario_sueno/...` | [`gday_jobs::SleepReminderJob`] |
//!
//! Errors are answered as `{"message": "..."}` (see [`error::ApiError`]).

#![deny(missing_docs)]

/// Service configuration.
pub mod config;

/// HTTP error type.
pub mod error;

/// Notification endpoints.
pub mod notifications;

/// Weekly report endpoints.
pub mod reports;

/// Service bootstrap.
pub mod server;

/// Sleep schedule endpoints.
pub mod sleep_schedules;

use std::sync::Arc;

use gday_store::DocumentStore;

pub use config::{ConfigError, ServiceConfig, ServiceKind};
pub use error::ApiError;
pub use server::{RunningService, StartError};

/// State shared by request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document store shared with the embedded job.
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Wrap a store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}
