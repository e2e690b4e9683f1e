// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the backend services.

use std::net::SocketAddr;

use gday_jobs::{ActivityNotificationJob, JobError, Schedule, SleepReminderJob, WeeklyReportJob};

/// Database used when `GDAY_DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:.data/gday.db?mode=rwc";

/// The backend services built from this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// `/notificaciones`, runs the activity notification job.
    Notifications,
    /// `/reportes`, runs the weekly report job.
    Reports,
    /// `/horario_sueno`, runs the sleep reminder job.
    SleepSchedules,
}

impl ServiceKind {
    /// Service name, also its route prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::Notifications => "notificaciones",
            Self::Reports => "reportes",
            Self::SleepSchedules => "horario_sueno",
        }
    }

    /// Variable holding the listen port.
    pub fn port_var(self) -> &'static str {
        match self {
            Self::Notifications => "PORT_NOTIFICACIONES",
            Self::Reports => "PORT_REPORTES",
            Self::SleepSchedules => "PORT_HORARIO_SUENO",
        }
    }

    /// Listen port when the variable is unset.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Notifications => 3004,
            Self::Reports => 3005,
            Self::SleepSchedules => 3008,
        }
    }

    /// Variable overriding the job schedule.
    pub fn schedule_var(self) -> &'static str {
        match self {
            Self::Notifications => "NOTIFICATIONS_SCHEDULE",
            Self::Reports => "WEEKLY_REPORT_SCHEDULE",
            Self::SleepSchedules => "SLEEP_REMINDER_SCHEDULE",
        }
    }

    /// Job schedule when the variable is unset.
    pub fn default_schedule(self) -> &'static str {
        match self {
            Self::Notifications => ActivityNotificationJob::DEFAULT_SCHEDULE,
            Self::Reports => WeeklyReportJob::DEFAULT_SCHEDULE,
            Self::SleepSchedules => SleepReminderJob::DEFAULT_SCHEDULE,
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Which service this is.
    pub kind: ServiceKind,
    /// Store connection string (`memory` or a SQLite URL).
    pub database_url: String,
    /// HTTP listen address.
    pub http_addr: SocketAddr,
    /// Schedule of the embedded job.
    pub schedule: Schedule,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env(kind: ServiceKind) -> Result<Self, ConfigError> {
        Self::from_lookup(kind, |key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(
        kind: ServiceKind,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url =
            lookup("GDAY_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let port: u16 = match lookup(kind.port_var()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(kind.port_var()))?,
            None => kind.default_port(),
        };
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let raw_schedule =
            lookup(kind.schedule_var()).unwrap_or_else(|| kind.default_schedule().to_string());
        let schedule =
            Schedule::parse(&raw_schedule).map_err(|source| ConfigError::InvalidSchedule {
                var: kind.schedule_var(),
                source,
            })?;

        Ok(Self {
            kind,
            database_url,
            http_addr,
            schedule,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number in {0}")]
    InvalidPort(&'static str),
    /// The job schedule could not be parsed.
    #[error("Invalid schedule in {var}: {source}")]
    InvalidSchedule {
        /// Variable holding the schedule.
        var: &'static str,
        /// Parse error.
        source: JobError,
    },
}
