// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weekly per-user activity aggregates.
//!
//! Runs Monday 00:00. The window is the week that just ended: previous
//! Monday 00:00 (inclusive) to the current Monday 00:00 (exclusive), computed
//! from the run time. Activities are grouped by owner using their start date.
//!
//! Every invocation inserts one aggregate per owner. Aggregates carry no
//! dedup key, so invoking the job twice for the same week stores the week
//! twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDateTime, NaiveTime};
use gday_store::model::{Activity, QuadrantCounts, WeeklyReport, parse_wall_clock};
use gday_store::{
    DocumentStore, Filter, FindOptions, ID_FIELD, collections, from_document, to_document,
};
use tracing::{debug, info, warn};

use crate::error::{JobError, Result};
use crate::runner::{Job, JobReport};

/// Half-open reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    /// First instant inside the window.
    pub start: NaiveDateTime,
    /// First instant after the window.
    pub end: NaiveDateTime,
}

impl ReportWindow {
    /// The full Monday-to-Sunday week before the one containing `now`.
    pub fn previous_week(now: NaiveDateTime) -> Self {
        let monday = now
            .date()
            .checked_sub_days(Days::new(u64::from(now.weekday().num_days_from_monday())))
            .unwrap_or(now.date());
        let end = monday.and_time(NaiveTime::MIN);
        let start = monday
            .checked_sub_days(Days::new(7))
            .unwrap_or(monday)
            .and_time(NaiveTime::MIN);
        Self { start, end }
    }

    /// Whether `at` falls inside the window.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }

    /// ISO week label of the window, e.g. `2026-W42`.
    pub fn label(&self) -> String {
        self.start.format("%G-W%V").to_string()
    }
}

#[derive(Debug, Default)]
struct Aggregate {
    total: u32,
    completed: u32,
    difficulty_sum: f64,
    difficulty_count: u32,
    minutes: i64,
    quadrants: QuadrantCounts,
}

impl Aggregate {
    fn add(&mut self, activity: &Activity, start: NaiveDateTime) {
        self.total += 1;
        if let Some(difficulty) = activity.dificultad {
            self.difficulty_sum += difficulty;
            self.difficulty_count += 1;
        }
        if let Some(quadrant) = activity.cuadrante.as_deref() {
            self.quadrants.record(quadrant);
        }
        if activity.is_completed() {
            self.completed += 1;
            let finished = activity.fecha_termino.as_deref().and_then(parse_wall_clock);
            if let Some(finished) = finished {
                self.minutes += (finished - start).num_minutes().max(0);
            }
        }
    }

    fn into_report(self, usuario_id: String, semana: String, now: NaiveDateTime) -> WeeklyReport {
        let promedio_dificultad = if self.difficulty_count == 0 {
            0.0
        } else {
            self.difficulty_sum / f64::from(self.difficulty_count)
        };
        WeeklyReport {
            id: None,
            usuario_id,
            semana,
            actividades_totales: self.total,
            actividades_terminadas: self.completed,
            actividades_no_terminadas: self.total - self.completed,
            promedio_dificultad,
            tiempo_total: self.minutes,
            cuadrantes: self.quadrants,
            fecha_creacion: now,
        }
    }
}

/// Inserts one weekly aggregate per user.
pub struct WeeklyReportJob {
    store: Arc<dyn DocumentStore>,
}

impl WeeklyReportJob {
    /// Default cron schedule.
    pub const DEFAULT_SCHEDULE: &'static str = "0 0 * * 1";

    /// Create the job over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Job for WeeklyReportJob {
    fn name(&self) -> &'static str {
        "weekly_reports"
    }

    async fn run(&self, now: NaiveDateTime) -> Result<JobReport> {
        let window = ReportWindow::previous_week(now);
        let semana = window.label();
        let docs = self
            .store
            .find(collections::ACTIVITIES, &Filter::new(), &FindOptions::default())
            .await?;

        let mut report = JobReport::default();
        let mut by_user: BTreeMap<String, Aggregate> = BTreeMap::new();

        for doc in docs {
            report.scanned += 1;
            let id = doc
                .get(ID_FIELD)
                .and_then(|v| v.as_str())
                .unwrap_or("<none>")
                .to_string();
            let parsed = from_document::<Activity>(doc)
                .map_err(|e| JobError::InvalidRecord(e.to_string()))
                .and_then(|activity| {
                    let raw = activity
                        .fecha_inicio
                        .as_deref()
                        .ok_or(JobError::MissingField("fechaInicio"))?;
                    let start = parse_wall_clock(raw).ok_or_else(|| JobError::InvalidDate {
                        field: "fechaInicio",
                        value: raw.to_string(),
                    })?;
                    Ok((activity, start))
                });
            match parsed {
                Ok((activity, start)) if window.contains(start) => {
                    by_user
                        .entry(activity.usuario_id.clone())
                        .or_default()
                        .add(&activity, start);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(activity_id = %id, error = %e, "Skipping activity");
                    report.failed += 1;
                }
            }
        }

        for (usuario_id, aggregate) in by_user {
            let weekly = aggregate.into_report(usuario_id.clone(), semana.clone(), now);
            let inserted = match to_document(&weekly) {
                Ok(doc) => self.store.insert_one(collections::REPORTS, doc).await,
                Err(e) => Err(e),
            };
            match inserted {
                Ok(id) => {
                    debug!(usuario_id = %usuario_id, report_id = %id, semana = %semana, "Weekly report created");
                    report.created += 1;
                }
                Err(e) => {
                    warn!(usuario_id = %usuario_id, error = %e, "Failed to store weekly report");
                    report.failed += 1;
                }
            }
        }

        info!(semana = %semana, reports = report.created, "Weekly reports generated");
        Ok(report)
    }
}
