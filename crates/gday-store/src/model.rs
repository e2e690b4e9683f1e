// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed views of the documents shared by services and jobs.
//!
//! Field names follow the stored JSON (`usuarioId`, `fechaInicio`, ...), which
//! is also what clients of the REST services see.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// Reminder lead time used when a sleep schedule does not set one.
pub const DEFAULT_REMINDER_MINUTES: i64 = 30;

/// Spanish weekday names accepted in `SleepSchedule::dias`, Monday first.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// Spanish name of a weekday.
pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

/// Category of a notification. Stored as the integer `tipo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NotificationKind {
    /// The activity has been completed.
    Completed = 1,
    /// The activity is due within the next two days.
    DueSoon = 2,
    /// The activity starts today.
    StartsToday = 3,
    /// Time to get ready for bed.
    SleepReminder = 4,
}

impl NotificationKind {
    /// Integer code stored in `tipo`.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<NotificationKind> for u8 {
    fn from(kind: NotificationKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u8> for NotificationKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Completed),
            2 => Ok(Self::DueSoon),
            3 => Ok(Self::StartsToday),
            4 => Ok(Self::SleepReminder),
            other => Err(format!("unknown notification tipo {}", other)),
        }
    }
}

/// A notification (derived record) in the `notificaciones` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Record id, absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Human-readable message.
    pub mensaje: String,
    /// Owner of the notification.
    pub usuario_id: String,
    /// Activity the notification was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actividad_id: Option<String>,
    /// Sleep schedule the notification was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horario_sueno_id: Option<String>,
    /// When the notification was generated (local wall clock).
    pub fecha: NaiveDateTime,
    /// Category.
    pub tipo: NotificationKind,
    /// Whether the owner has read it.
    pub leida: bool,
}

/// An activity (source record) in the `actividades` collection.
///
/// Dates are kept as raw strings; jobs parse them with [`parse_wall_clock`].
/// A missing or unparseable date only disables the checks that need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Record id.
    #[serde(rename = "_id")]
    pub id: RecordId,
    /// Owner.
    pub usuario_id: String,
    /// Display name.
    pub nombre_actividad: String,
    /// Start date.
    #[serde(default)]
    pub fecha_inicio: Option<String>,
    /// Due date.
    #[serde(default)]
    pub fecha_fin: Option<String>,
    /// Workflow state (`Pendiente`, `En proceso`, `Terminada`, ...).
    #[serde(default)]
    pub estado: Option<String>,
    /// Explicit completion flag.
    #[serde(default)]
    pub completada: Option<bool>,
    /// Eisenhower quadrant (`I`..`IV`).
    #[serde(default)]
    pub cuadrante: Option<String>,
    /// Difficulty from 1 to 5.
    #[serde(default)]
    pub dificultad: Option<f64>,
    /// When the activity was finished.
    #[serde(default)]
    pub fecha_termino: Option<String>,
}

impl Activity {
    /// State value marking a finished activity.
    pub const FINISHED: &'static str = "Terminada";

    /// Whether the activity counts as completed.
    pub fn is_completed(&self) -> bool {
        self.completada == Some(true) || self.estado.as_deref() == Some(Self::FINISHED)
    }
}

/// A sleep schedule (source record) in the `horario_sueno` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSchedule {
    /// Record id, absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Owner.
    pub usuario_id: String,
    /// Bedtime, `HH:MM`.
    pub hora_acostarse: String,
    /// Wake-up time, `HH:MM`.
    pub hora_despertarse: String,
    /// Weekdays (Spanish names) the schedule applies to.
    #[serde(default)]
    pub dias: Vec<String>,
    /// Minutes before bedtime to send the reminder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recordatorio_minutos: Option<i64>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl SleepSchedule {
    /// Reminder lead time; zero or missing falls back to the default.
    pub fn reminder_minutes(&self) -> i64 {
        match self.recordatorio_minutos {
            Some(m) if m != 0 => m,
            _ => DEFAULT_REMINDER_MINUTES,
        }
    }
}

/// Activity counts per Eisenhower quadrant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantCounts {
    /// Urgent and important.
    #[serde(rename = "I", default)]
    pub i: u32,
    /// Important, not urgent.
    #[serde(rename = "II", default)]
    pub ii: u32,
    /// Urgent, not important.
    #[serde(rename = "III", default)]
    pub iii: u32,
    /// Neither.
    #[serde(rename = "IV", default)]
    pub iv: u32,
}

impl QuadrantCounts {
    /// Count one activity in `quadrant`. Unknown quadrants are ignored.
    pub fn record(&mut self, quadrant: &str) {
        match quadrant {
            "I" => self.i += 1,
            "II" => self.ii += 1,
            "III" => self.iii += 1,
            "IV" => self.iv += 1,
            _ => {}
        }
    }
}

/// Weekly per-user aggregate in the `reportes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Record id, absent before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Owner.
    pub usuario_id: String,
    /// ISO week label, e.g. `2026-W41`.
    pub semana: String,
    /// Activities starting in the week.
    pub actividades_totales: u32,
    /// Of which completed.
    pub actividades_terminadas: u32,
    /// Of which not completed.
    pub actividades_no_terminadas: u32,
    /// Mean difficulty of activities that have one, 0 when none do.
    pub promedio_dificultad: f64,
    /// Minutes between start and finish, summed over completed activities.
    pub tiempo_total: i64,
    /// Counts per quadrant.
    #[serde(default)]
    pub cuadrantes: QuadrantCounts,
    /// When the aggregate was computed.
    pub fecha_creacion: NaiveDateTime,
}

/// Parse a stored date into local wall-clock time.
///
/// Accepts RFC 3339 timestamps (converted to the local zone), naive
/// date-times (`2026-10-18T09:30:00`, optionally with fractional seconds or a
/// space separator) and plain dates (midnight).
pub fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
