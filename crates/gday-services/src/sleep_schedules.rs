// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sleep schedule endpoints.
//!
//! Schedules are the source records of the sleep reminder job. Times are
//! `HH:MM` (24h, leading zero optional) and days are Spanish weekday names.

use std::sync::LazyLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Local;
use gday_store::model::{DEFAULT_REMINDER_MINUTES, SleepSchedule, WEEKDAY_NAMES};
use gday_store::{Document, Filter, FindOptions, SortOrder, collections, to_document};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::{ApiError, parse_id};

static HH_MM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").expect("valid HH:MM pattern")
});

const INVALID_TIME: &str = "Formato de hora inválido. Use HH:MM";

/// Routes of the sleep schedule service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/horario_sueno", post(create))
        .route("/horario_sueno/usuario/{usuario_id}", get(list_for_user))
        .route("/horario_sueno/{id}", put(update).delete(remove))
        .with_state(state)
}

/// Whether `raw` is a valid `HH:MM` time.
pub fn is_valid_time(raw: &str) -> bool {
    HH_MM.is_match(raw)
}

fn validate_days(dias: &[String]) -> Result<(), ApiError> {
    match dias.iter().find(|d| !WEEKDAY_NAMES.contains(&d.as_str())) {
        Some(day) => Err(ApiError::bad_request(format!("Día inválido: {}", day))),
        None => Ok(()),
    }
}

fn validate_reminder(minutes: Option<i64>) -> Result<(), ApiError> {
    match minutes {
        Some(m) if m < 0 => Err(ApiError::bad_request(
            "recordatorioMinutos debe ser un número positivo",
        )),
        _ => Ok(()),
    }
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Cuerpo de la solicitud inválido: {}", rejection.body_text()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSleepSchedule {
    usuario_id: Option<String>,
    hora_acostarse: Option<String>,
    hora_despertarse: Option<String>,
    #[serde(default)]
    dias: Vec<String>,
    recordatorio_minutos: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSleepSchedule {
    hora_acostarse: Option<String>,
    hora_despertarse: Option<String>,
    dias: Option<Vec<String>>,
    recordatorio_minutos: Option<i64>,
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateSleepSchedule>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = payload.map_err(invalid_body)?;

    let usuario_id = parse_id(
        body.usuario_id.as_deref().unwrap_or_default(),
        "ID de usuario inválido",
    )?;
    let (Some(hora_acostarse), Some(hora_despertarse)) = (body.hora_acostarse, body.hora_despertarse)
    else {
        return Err(ApiError::bad_request(INVALID_TIME));
    };
    if !is_valid_time(&hora_acostarse) || !is_valid_time(&hora_despertarse) {
        return Err(ApiError::bad_request(INVALID_TIME));
    }
    validate_days(&body.dias)?;
    validate_reminder(body.recordatorio_minutos)?;

    let now = Local::now().naive_local();
    let schedule = SleepSchedule {
        id: None,
        usuario_id: usuario_id.to_string(),
        hora_acostarse,
        hora_despertarse,
        dias: body.dias,
        recordatorio_minutos: Some(
            body.recordatorio_minutos
                .filter(|m| *m != 0)
                .unwrap_or(DEFAULT_REMINDER_MINUTES),
        ),
        created_at: Some(now),
        updated_at: Some(now),
    };

    let doc = to_document(&schedule).map_err(ApiError::store("Error al crear horario de sueño"))?;
    let id = state
        .store
        .insert_one(collections::SLEEP_SCHEDULES, doc)
        .await
        .map_err(ApiError::store("Error al crear horario de sueño"))?;

    info!(schedule_id = %id, usuario_id = %usuario_id, "Sleep schedule created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Horario de sueño creado", "id": id })),
    ))
}

async fn list_for_user(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let usuario_id = parse_id(&usuario_id, "ID de usuario inválido")?;
    let schedules = state
        .store
        .find(
            collections::SLEEP_SCHEDULES,
            &Filter::new().eq("usuarioId", usuario_id.as_str()),
            &FindOptions::default().sort_by("createdAt", SortOrder::Desc),
        )
        .await
        .map_err(ApiError::store("Error al obtener horarios de sueño"))?;
    Ok(Json(schedules))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateSleepSchedule>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "ID de horario inválido")?;
    let Json(body) = payload.map_err(invalid_body)?;

    // empty strings and a zero reminder leave the stored value untouched
    let mut set = Document::new();
    set.insert("updatedAt".to_string(), json!(Local::now().naive_local()));
    for (field, value) in [
        ("horaAcostarse", body.hora_acostarse),
        ("horaDespertarse", body.hora_despertarse),
    ] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            if !is_valid_time(&value) {
                return Err(ApiError::bad_request(INVALID_TIME));
            }
            set.insert(field.to_string(), Value::String(value));
        }
    }
    if let Some(dias) = body.dias {
        validate_days(&dias)?;
        set.insert("dias".to_string(), json!(dias));
    }
    validate_reminder(body.recordatorio_minutos)?;
    if let Some(minutes) = body.recordatorio_minutos.filter(|m| *m != 0) {
        set.insert("recordatorioMinutos".to_string(), json!(minutes));
    }

    let matched = state
        .store
        .update_by_id(collections::SLEEP_SCHEDULES, &id, set)
        .await
        .map_err(ApiError::store("Error al actualizar horario"))?;
    if !matched {
        return Err(ApiError::not_found("Horario no encontrado"));
    }

    info!(schedule_id = %id, "Sleep schedule updated");
    Ok(Json(json!({ "message": "Horario actualizado" })))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "ID de horario inválido")?;
    let deleted = state
        .store
        .delete_by_id(collections::SLEEP_SCHEDULES, &id)
        .await
        .map_err(ApiError::store("Error al eliminar horario"))?;
    if !deleted {
        return Err(ApiError::not_found("Horario no encontrado"));
    }

    info!(schedule_id = %id, "Sleep schedule deleted");
    Ok(Json(json!({ "message": "Horario eliminado" })))
}
