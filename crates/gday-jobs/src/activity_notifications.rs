// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Activity notifications.
//!
//! Every activity is checked against three independent predicates, each one
//! producing its own notification category:
//!
//! | tipo | Predicate |
//! |------|-----------|
//! | 3 | start date is today |
//! | 2 | due date falls between today and today + 2 days, inclusive |
//! | 1 | the activity is completed |
//!
//! Dates are compared as calendar days in local time. Notifications are
//! keyed by (usuarioId, actividadId, tipo), so an activity produces each
//! category at most once over its lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime};
use gday_store::model::{Activity, Notification, NotificationKind, parse_wall_clock};
use gday_store::{
    DedupKey, Document, DocumentStore, Filter, FindOptions, InsertOutcome, collections,
    from_document, to_document,
};
use tracing::{debug, warn};

use crate::error::{JobError, Result};
use crate::runner::{Job, JobReport};

/// Days ahead of today that still count as "due soon".
pub const DUE_SOON_DAYS: u64 = 2;

/// Creates start/due/completed notifications from activities.
pub struct ActivityNotificationJob {
    store: Arc<dyn DocumentStore>,
}

impl ActivityNotificationJob {
    /// Default cron schedule.
    pub const DEFAULT_SCHEDULE: &'static str = "*/5 * * * *";

    /// Create the job over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Insert the notifications due for one activity document.
    async fn process(&self, doc: Document, today: NaiveDate, report: &mut JobReport) -> Result<()> {
        let activity: Activity =
            from_document(doc).map_err(|e| JobError::InvalidRecord(e.to_string()))?;

        for kind in due_kinds(&activity, today)? {
            let Some(mensaje) = message(kind, &activity.nombre_actividad) else {
                continue;
            };
            let key = DedupKey::new(&activity.usuario_id, activity.id.as_str(), kind.code());
            let notification = Notification {
                id: None,
                mensaje,
                usuario_id: activity.usuario_id.clone(),
                actividad_id: Some(activity.id.to_string()),
                horario_sueno_id: None,
                fecha: midnight(today),
                tipo: kind,
                leida: false,
            };

            match self
                .store
                .insert_unique(collections::NOTIFICATIONS, &key, to_document(&notification)?)
                .await?
            {
                InsertOutcome::Inserted(id) => {
                    debug!(activity_id = %activity.id, notification_id = %id, tipo = kind.code(), "Notification created");
                    report.created += 1;
                }
                InsertOutcome::AlreadyExists => report.skipped += 1,
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Job for ActivityNotificationJob {
    fn name(&self) -> &'static str {
        "activity_notifications"
    }

    async fn run(&self, now: NaiveDateTime) -> Result<JobReport> {
        let today = now.date();
        let docs = self
            .store
            .find(collections::ACTIVITIES, &Filter::new(), &FindOptions::default())
            .await?;

        let mut report = JobReport::default();
        for doc in docs {
            report.scanned += 1;
            let id = doc
                .get(gday_store::ID_FIELD)
                .and_then(|v| v.as_str())
                .unwrap_or("<none>")
                .to_string();
            if let Err(e) = self.process(doc, today, &mut report).await {
                warn!(activity_id = %id, error = %e, "Skipping activity");
                report.failed += 1;
            }
        }

        Ok(report)
    }
}

/// Notification categories whose predicate holds for `activity` on `today`.
///
/// Each predicate only needs its own fields: an unusable `fechaFin` disables
/// the due-soon check and an unusable `fechaInicio` the starts-today check.
/// Fails only when both dates are unusable and the activity is not completed,
/// since nothing could then be decided about it.
pub fn due_kinds(activity: &Activity, today: NaiveDate) -> Result<Vec<NotificationKind>> {
    let start = parse_day("fechaInicio", activity.fecha_inicio.as_deref());
    let end = parse_day("fechaFin", activity.fecha_fin.as_deref());
    let horizon = today
        .checked_add_days(Days::new(DUE_SOON_DAYS))
        .unwrap_or(NaiveDate::MAX);
    let completed = activity.is_completed();

    let mut kinds = Vec::new();
    match &start {
        Ok(start) if *start == today => kinds.push(NotificationKind::StartsToday),
        Ok(_) => {}
        Err(e) => debug!(activity_id = %activity.id, error = %e, "Start date check skipped"),
    }
    match &end {
        Ok(end) if today <= *end && *end <= horizon => kinds.push(NotificationKind::DueSoon),
        Ok(_) => {}
        Err(e) => debug!(activity_id = %activity.id, error = %e, "Due date check skipped"),
    }
    if completed {
        kinds.push(NotificationKind::Completed);
    }

    match (start, end) {
        (Err(e), Err(_)) if !completed => Err(e),
        _ => Ok(kinds),
    }
}

/// Notification text for an activity. `None` for categories that are not
/// derived from activities.
pub fn message(kind: NotificationKind, activity_name: &str) -> Option<String> {
    let text = match kind {
        NotificationKind::StartsToday => format!("La actividad \"{}\" comienza hoy.", activity_name),
        NotificationKind::DueSoon => {
            format!("La actividad \"{}\" está próxima a vencer.", activity_name)
        }
        NotificationKind::Completed => {
            format!("La actividad \"{}\" ha sido completada.", activity_name)
        }
        NotificationKind::SleepReminder => return None,
    };
    Some(text)
}

fn parse_day(field: &'static str, raw: Option<&str>) -> Result<NaiveDate> {
    let raw = raw.ok_or(JobError::MissingField(field))?;
    parse_wall_clock(raw)
        .map(|dt| dt.date())
        .ok_or_else(|| JobError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gday_store::{MemoryStore, RecordId};
    use serde_json::{Value, json};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(d: NaiveDate) -> NaiveDateTime {
        d.and_hms_opt(12, 0, 0).unwrap()
    }

    fn activity(start: &str, end: &str) -> Value {
        json!({
            "_id": RecordId::new().to_string(),
            "usuarioId": "u1",
            "nombreActividad": "Estudiar",
            "fechaInicio": start,
            "fechaFin": end,
            "estado": "Pendiente"
        })
    }

    async fn seeded(activities: Vec<Value>) -> (Arc<MemoryStore>, ActivityNotificationJob) {
        let store = Arc::new(MemoryStore::new());
        for a in activities {
            store
                .insert_one(collections::ACTIVITIES, to_document(&a).unwrap())
                .await
                .unwrap();
        }
        let job = ActivityNotificationJob::new(store.clone());
        (store, job)
    }

    async fn notifications(store: &MemoryStore) -> Vec<Notification> {
        store
            .find(collections::NOTIFICATIONS, &Filter::new(), &FindOptions::default())
            .await
            .unwrap()
            .into_iter()
            .map(|d| from_document(d).unwrap())
            .collect()
    }

    #[test]
    fn test_due_kinds_predicates() {
        let today = day(2026, 10, 18);
        let mut a: Activity =
            serde_json::from_value(activity("2026-10-18", "2026-10-30")).unwrap();
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::StartsToday]);

        a.fecha_inicio = Some("2026-10-01".to_string());
        a.fecha_fin = Some("2026-10-20".to_string());
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::DueSoon]);

        a.fecha_fin = Some("2026-10-21".to_string());
        assert!(due_kinds(&a, today).unwrap().is_empty());

        a.fecha_fin = Some("2026-10-17".to_string());
        assert!(due_kinds(&a, today).unwrap().is_empty(), "already due");

        a.estado = Some(Activity::FINISHED.to_string());
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::Completed]);
    }

    #[test]
    fn test_due_window_is_date_normalized() {
        let today = day(2026, 10, 18);
        let a: Activity =
            serde_json::from_value(activity("2026-10-01", "2026-10-18T23:59:00")).unwrap();
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::DueSoon]);
    }

    #[test]
    fn test_bad_date_only_disables_its_own_check() {
        let today = day(2026, 10, 18);

        let a: Activity = serde_json::from_value(activity("mañana", "2026-10-20")).unwrap();
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::DueSoon]);

        let a: Activity = serde_json::from_value(activity("2026-10-18", "pronto")).unwrap();
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::StartsToday]);

        let mut a: Activity = serde_json::from_value(activity("mañana", "pronto")).unwrap();
        assert!(matches!(
            due_kinds(&a, today),
            Err(JobError::InvalidDate { field: "fechaInicio", .. })
        ));

        a.fecha_inicio = None;
        a.fecha_fin = None;
        assert!(matches!(
            due_kinds(&a, today),
            Err(JobError::MissingField("fechaInicio"))
        ));

        a.estado = Some(Activity::FINISHED.to_string());
        assert_eq!(due_kinds(&a, today).unwrap(), vec![NotificationKind::Completed]);
    }

    #[tokio::test]
    async fn test_starts_today_created_once() {
        let today = day(2026, 10, 18);
        let (store, job) = seeded(vec![activity("2026-10-18", "2026-11-30")]).await;

        let first = job.run(noon(today)).await.unwrap();
        assert_eq!(first.created, 1);

        let second = job.run(noon(today)).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 1);

        let all = notifications(&store).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tipo, NotificationKind::StartsToday);
        assert_eq!(all[0].mensaje, "La actividad \"Estudiar\" comienza hoy.");
        assert_eq!(all[0].fecha, midnight(today));
        assert!(!all[0].leida);
    }

    #[tokio::test]
    async fn test_due_soon_created_once() {
        let today = day(2026, 10, 18);
        let (store, job) = seeded(vec![activity("2026-10-01", "2026-10-20")]).await;

        job.run(noon(today)).await.unwrap();
        // the next day the activity is still due soon; the key prevents a repeat
        job.run(noon(day(2026, 10, 19))).await.unwrap();

        let all = notifications(&store).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tipo, NotificationKind::DueSoon);
    }

    #[tokio::test]
    async fn test_rerun_on_unchanged_data_is_idempotent() {
        let today = day(2026, 10, 18);
        let mut done = activity("2026-10-18", "2026-10-19");
        done["completada"] = json!(true);
        let (store, job) = seeded(vec![
            done,
            activity("2026-10-10", "2026-10-20"),
            activity("2026-09-01", "2026-09-10"),
        ])
        .await;

        let first = job.run(noon(today)).await.unwrap();
        let snapshot: Vec<_> = notifications(&store)
            .await
            .into_iter()
            .map(|n| (n.actividad_id, n.tipo))
            .collect();
        assert_eq!(first.scanned, 3);
        assert_eq!(first.created, 4);

        let second = job.run(noon(today)).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 4);

        let after: Vec<_> = notifications(&store)
            .await
            .into_iter()
            .map(|n| (n.actividad_id, n.tipo))
            .collect();
        assert_eq!(snapshot, after);
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_stop_batch() {
        let today = day(2026, 10, 18);
        let (store, job) = seeded(vec![
            json!({"_id": RecordId::new().to_string(), "usuarioId": "u1"}),
            activity("no es fecha", "tampoco"),
            activity("2026-10-18", "2026-12-01"),
        ])
        .await;

        let report = job.run(noon(today)).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.created, 1);
        assert_eq!(store.count(collections::NOTIFICATIONS).await, 1);
    }

    #[tokio::test]
    async fn test_missing_or_bad_due_date_keeps_other_categories() {
        let today = day(2026, 10, 18);
        let finished_id = RecordId::new().to_string();
        let starting_id = RecordId::new().to_string();
        let (store, job) = seeded(vec![
            json!({
                "_id": finished_id,
                "usuarioId": "u1",
                "nombreActividad": "Leer",
                "fechaInicio": "2026-09-01",
                "estado": "Terminada"
            }),
            json!({
                "_id": starting_id,
                "usuarioId": "u1",
                "nombreActividad": "Correr",
                "fechaInicio": "2026-10-18",
                "fechaFin": "pronto",
                "estado": "Pendiente"
            }),
        ])
        .await;

        let report = job.run(noon(today)).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.created, 2);

        let mut created: Vec<_> = notifications(&store)
            .await
            .into_iter()
            .map(|n| (n.actividad_id.unwrap(), n.tipo))
            .collect();
        created.sort_by_key(|(_, tipo)| tipo.code());
        assert_eq!(
            created,
            vec![
                (finished_id, NotificationKind::Completed),
                (starting_id, NotificationKind::StartsToday),
            ]
        );
    }

    #[tokio::test]
    async fn test_deleted_notification_is_recreated() {
        let today = day(2026, 10, 18);
        let (store, job) = seeded(vec![activity("2026-10-18", "2026-12-01")]).await;
        job.run(noon(today)).await.unwrap();

        let existing = store
            .find_one(collections::NOTIFICATIONS, &Filter::new())
            .await
            .unwrap()
            .unwrap();
        let id = RecordId::parse(existing["_id"].as_str().unwrap()).unwrap();
        assert!(store.delete_by_id(collections::NOTIFICATIONS, &id).await.unwrap());

        let report = job.run(noon(today)).await.unwrap();
        assert_eq!(report.created, 1);
    }
}
