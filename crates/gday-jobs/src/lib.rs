// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day Jobs - scheduled background jobs embedded in the backend services.
//!
//! Each job scans a source collection and inserts derived records. A
//! [`JobRunner`] triggers a job on a [`Schedule`] and guards it with a
//! run-lock so two invocations of the same job never scan concurrently.
//!
//! # Jobs
//!
//! | Job | Default schedule | Source | Derived |
//! |-----|------------------|--------|---------|
//! | [`ActivityNotificationJob`] | `*/5 * * * *` | `actividades` | `notificaciones` tipo 1-3, deduplicated |
//! | [`SleepReminderJob`] | `* * * * *` | `horario_sueno` | `notificaciones` tipo 4, one per schedule per day |
//! | [`WeeklyReportJob`] | `0 0 * * 1` | `actividades` | `reportes`, one per user per run |
//!
//! # Job State Machine
//!
//! ```text
//!   ┌──────┐  tick / trigger   ┌─────────┐
//!   │ IDLE │ ────────────────► │ RUNNING │
//!   └──────┘ ◄──────────────── └─────────┘
//!       ▲        batch done         │
//!       │                           │ tick while RUNNING
//!       └──────── skipped ◄─────────┘
//! ```
//!
//! Per-record failures (malformed documents, unparseable dates) are logged
//! and counted in the [`JobReport`]; they never abort the batch. A failure of
//! the whole batch (store unreachable) is logged by the runner, which waits
//! for the next tick.

#![deny(missing_docs)]

/// Activity notifications (starts today, due soon, completed).
pub mod activity_notifications;

/// Job error types.
pub mod error;

/// Job trait, run-lock and scheduling loop.
pub mod runner;

/// Fixed-interval and cron schedules.
pub mod schedule;

/// Bedtime reminders from sleep schedules.
pub mod sleep_reminders;

/// Weekly per-user activity aggregates.
pub mod weekly_reports;

pub use activity_notifications::ActivityNotificationJob;
pub use error::{JobError, Result};
pub use runner::{Job, JobHandle, JobReport, JobRunner, JobState};
pub use schedule::Schedule;
pub use sleep_reminders::SleepReminderJob;
pub use weekly_reports::WeeklyReportJob;
