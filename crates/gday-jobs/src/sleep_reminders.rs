// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bedtime reminders.
//!
//! Runs every minute. A schedule fires when today's weekday is listed in its
//! `dias` and the current hour and minute equal bedtime minus the reminder
//! lead time. The subtraction wraps across midnight: a 00:10 bedtime with a
//! 30 minute lead fires at 23:40.
//!
//! Reminders repeat daily, so the dedup key is scoped to the calendar day.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use gday_store::model::{Notification, NotificationKind, SleepSchedule, weekday_name};
use gday_store::{
    DedupKey, Document, DocumentStore, Filter, FindOptions, ID_FIELD, InsertOutcome, collections,
    from_document, to_document,
};
use tracing::{debug, warn};

use crate::error::{JobError, Result};
use crate::runner::{Job, JobReport};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Creates tipo 4 notifications ahead of bedtime.
pub struct SleepReminderJob {
    store: Arc<dyn DocumentStore>,
}

impl SleepReminderJob {
    /// Default cron schedule.
    pub const DEFAULT_SCHEDULE: &'static str = "* * * * *";

    /// Create the job over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn process(&self, doc: Document, now: NaiveDateTime, report: &mut JobReport) -> Result<()> {
        let schedule: SleepSchedule =
            from_document(doc).map_err(|e| JobError::InvalidRecord(e.to_string()))?;
        let Some(schedule_id) = schedule.id.as_ref() else {
            return Err(JobError::InvalidRecord("sleep schedule without _id".to_string()));
        };

        if !reminder_due(&schedule, now)? {
            return Ok(());
        }

        let today = now.date();
        let key = DedupKey::new(
            &schedule.usuario_id,
            schedule_id.as_str(),
            NotificationKind::SleepReminder.code(),
        )
        .on_day(today);
        let notification = Notification {
            id: None,
            mensaje: format!(
                "Recordatorio: Es hora de prepararse para dormir. Tu horario indica acostarte a {}",
                schedule.hora_acostarse
            ),
            usuario_id: schedule.usuario_id.clone(),
            actividad_id: None,
            horario_sueno_id: Some(schedule_id.to_string()),
            fecha: now,
            tipo: NotificationKind::SleepReminder,
            leida: false,
        };

        match self
            .store
            .insert_unique(collections::NOTIFICATIONS, &key, to_document(&notification)?)
            .await?
        {
            InsertOutcome::Inserted(id) => {
                debug!(schedule_id = %schedule_id, notification_id = %id, "Sleep reminder created");
                report.created += 1;
            }
            InsertOutcome::AlreadyExists => report.skipped += 1,
        }
        Ok(())
    }
}

#[async_trait]
impl Job for SleepReminderJob {
    fn name(&self) -> &'static str {
        "sleep_reminders"
    }

    async fn run(&self, now: NaiveDateTime) -> Result<JobReport> {
        let docs = self
            .store
            .find(collections::SLEEP_SCHEDULES, &Filter::new(), &FindOptions::default())
            .await?;

        let mut report = JobReport::default();
        for doc in docs {
            report.scanned += 1;
            let id = doc
                .get(ID_FIELD)
                .and_then(|v| v.as_str())
                .unwrap_or("<none>")
                .to_string();
            if let Err(e) = self.process(doc, now, &mut report).await {
                warn!(schedule_id = %id, error = %e, "Skipping sleep schedule");
                report.failed += 1;
            }
        }
        Ok(report)
    }
}

/// Parse a `HH:MM` wall-clock time.
pub fn parse_hh_mm(raw: &str) -> Result<NaiveTime> {
    let invalid = || JobError::InvalidTime(raw.to_string());
    let (hours, minutes) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

/// Minute of the day the reminder fires at.
pub fn reminder_minute_of_day(schedule: &SleepSchedule) -> Result<i64> {
    let bedtime = parse_hh_mm(&schedule.hora_acostarse)?;
    let bedtime = i64::from(bedtime.hour() * 60 + bedtime.minute());
    Ok((bedtime - schedule.reminder_minutes()).rem_euclid(MINUTES_PER_DAY))
}

/// Whether `schedule` should remind at `now`.
pub fn reminder_due(schedule: &SleepSchedule, now: NaiveDateTime) -> Result<bool> {
    let today = weekday_name(now.date().weekday());
    if !schedule.dias.iter().any(|d| d == today) {
        return Ok(false);
    }
    let current = i64::from(now.hour() * 60 + now.minute());
    Ok(reminder_minute_of_day(schedule)? == current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gday_store::{MemoryStore, RecordId};
    use serde_json::json;

    // 2026-10-19 is a Monday
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn schedule(bedtime: &str, dias: &[&str], lead: Option<i64>) -> SleepSchedule {
        SleepSchedule {
            id: Some(RecordId::new()),
            usuario_id: "64b7f0c2a1b2c3d4e5f6a7b8".to_string(),
            hora_acostarse: bedtime.to_string(),
            hora_despertarse: "07:00".to_string(),
            dias: dias.iter().map(|d| d.to_string()).collect(),
            recordatorio_minutos: lead,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_parse_hh_mm() {
        assert_eq!(parse_hh_mm("23:05").unwrap(), NaiveTime::from_hms_opt(23, 5, 0).unwrap());
        assert_eq!(parse_hh_mm("7:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(parse_hh_mm("24:00").is_err());
        assert!(parse_hh_mm("2300").is_err());
        assert!(parse_hh_mm("aa:bb").is_err());
    }

    #[test]
    fn test_reminder_uses_default_lead() {
        let s = schedule("23:00", &["Lunes"], None);
        assert!(reminder_due(&s, monday_at(22, 30)).unwrap());
        assert!(!reminder_due(&s, monday_at(22, 31)).unwrap());
        assert!(!reminder_due(&s, monday_at(23, 0)).unwrap());
    }

    #[test]
    fn test_reminder_wraps_across_midnight() {
        let s = schedule("00:10", &["Lunes"], Some(30));
        assert_eq!(reminder_minute_of_day(&s).unwrap(), 23 * 60 + 40);
        assert!(reminder_due(&s, monday_at(23, 40)).unwrap());
    }

    #[test]
    fn test_reminder_respects_weekdays() {
        let s = schedule("23:00", &["Martes", "Miércoles"], Some(15));
        assert!(!reminder_due(&s, monday_at(22, 45)).unwrap());
    }

    #[tokio::test]
    async fn test_one_reminder_per_schedule_per_day() {
        let store = Arc::new(MemoryStore::new());
        let s = schedule("23:00", &["Lunes"], Some(30));
        store
            .insert_one(collections::SLEEP_SCHEDULES, to_document(&s).unwrap())
            .await
            .unwrap();
        let job = SleepReminderJob::new(store.clone());

        let first = job.run(monday_at(22, 30)).await.unwrap();
        assert_eq!(first.created, 1);
        let again = job.run(monday_at(22, 30)).await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.skipped, 1);
        let later = job.run(monday_at(22, 31)).await.unwrap();
        assert_eq!(later.created, 0);

        let stored: Notification = from_document(
            store
                .find_one(collections::NOTIFICATIONS, &Filter::new())
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(stored.tipo, NotificationKind::SleepReminder);
        assert_eq!(stored.horario_sueno_id, s.id.as_ref().map(|id| id.to_string()));
        assert_eq!(
            stored.mensaje,
            "Recordatorio: Es hora de prepararse para dormir. Tu horario indica acostarte a 23:00"
        );

        // the following Monday reminds again
        let next_week = monday_at(22, 30) + chrono::Duration::days(7);
        let report = job.run(next_week).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(store.count(collections::NOTIFICATIONS).await, 2);
    }

    #[tokio::test]
    async fn test_bad_bedtime_is_a_record_failure() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_one(
                collections::SLEEP_SCHEDULES,
                to_document(&schedule("tarde", &["Lunes"], None)).unwrap(),
            )
            .await
            .unwrap();
        store
            .insert_one(
                collections::SLEEP_SCHEDULES,
                to_document(&json!({"usuarioId": "u1"})).unwrap(),
            )
            .await
            .unwrap();
        store
            .insert_one(
                collections::SLEEP_SCHEDULES,
                to_document(&schedule("23:00", &["Lunes"], None)).unwrap(),
            )
            .await
            .unwrap();

        let report = SleepReminderJob::new(store.clone())
            .run(monday_at(22, 30))
            .await
            .unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.created, 1);
    }
}
