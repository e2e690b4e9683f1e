// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixed-interval and cron schedules.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use croner::Cron;

use crate::error::{JobError, Result};

/// When a job fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fire every `Duration`, starting one interval after the runner starts.
    Every(Duration),
    /// Fire on the local wall-clock instants matched by a cron expression.
    Cron {
        /// Original expression, kept for logging.
        expression: String,
        /// Parsed expression.
        cron: Cron,
    },
}

impl Schedule {
    /// Fixed interval.
    pub fn every(interval: Duration) -> Self {
        Self::Every(interval)
    }

    /// Five-field cron expression (minute hour day-of-month month day-of-week).
    pub fn cron(expression: &str) -> Result<Self> {
        let cron = Cron::new(expression)
            .parse()
            .map_err(|e| JobError::Schedule(format!("{:?}: {}", expression, e)))?;
        Ok(Self::Cron {
            expression: expression.to_string(),
            cron,
        })
    }

    /// Parse a configured schedule.
    ///
    /// `every <n>s` / `every <n>m` / `every <n>h` produce a fixed interval;
    /// anything else is read as a cron expression.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let Some(interval) = raw.strip_prefix("every ") else {
            return Self::cron(raw);
        };
        let interval = interval.trim();
        let unit_at = interval.char_indices().last().map(|(i, _)| i).unwrap_or(0);
        let (digits, unit) = interval.split_at(unit_at);
        let amount: u64 = digits
            .parse()
            .map_err(|_| JobError::Schedule(format!("invalid interval {:?}", raw)))?;
        let unit_secs: u64 = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => return Err(JobError::Schedule(format!("invalid interval unit in {:?}", raw))),
        };
        let secs = amount
            .checked_mul(unit_secs)
            .ok_or_else(|| JobError::Schedule(format!("interval too large: {:?}", raw)))?;
        if secs == 0 {
            return Err(JobError::Schedule(format!("interval must be positive: {:?}", raw)));
        }
        Ok(Self::Every(Duration::from_secs(secs)))
    }

    /// Time to wait from `now` until the next firing.
    pub fn delay_from(&self, now: DateTime<Local>) -> Result<Duration> {
        match self {
            Self::Every(interval) => Ok(*interval),
            Self::Cron { expression, cron } => {
                let next = cron
                    .find_next_occurrence(&now, false)
                    .map_err(|e| JobError::Schedule(format!("{:?}: {}", expression, e)))?;
                // a negative span can only come from clock skew; fire right away
                Ok((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(interval) => write!(f, "every {}s", interval.as_secs()),
            Self::Cron { expression, .. } => f.write_str(expression),
        }
    }
}
