// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notification endpoints.
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET | `/notificaciones/{usuarioId}?page&limit` | page of notifications, newest first |
//! | GET | `/notificaciones/noleidas/{usuarioId}` | unread notifications |
//! | GET | `/notificaciones/{usuarioId}/estado?leida=` | notifications by read flag, 404 when none |
//! | PUT | `/notificaciones/marcar-leida/{id}` | sets `leida = true` |
//! | DELETE | `/notificaciones/eliminar/{id}` | deletes, 404 when missing |

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use gday_store::{Document, Filter, FindOptions, SortOrder, collections, to_document};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::{ApiError, parse_id};

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;

/// Routes of the notifications service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/notificaciones/{usuario_id}", get(list_for_user))
        .route("/notificaciones/noleidas/{usuario_id}", get(list_unread))
        .route("/notificaciones/{usuario_id}/estado", get(list_by_read_flag))
        .route("/notificaciones/marcar-leida/{id}", put(mark_read))
        .route("/notificaciones/eliminar/{id}", delete(remove))
        .with_state(state)
}

/// Paging parameters, kept as raw strings so malformed values get the
/// service's own 400 envelope.
#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<String>,
    limit: Option<String>,
}

impl PageParams {
    fn resolve(&self) -> Result<(u64, u64), ApiError> {
        let parse = |raw: &Option<String>, default: u64| match raw {
            None => Some(default),
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|n| *n > 0),
        };
        match (parse(&self.page, DEFAULT_PAGE), parse(&self.limit, DEFAULT_LIMIT)) {
            (Some(page), Some(limit)) => Ok((page, limit)),
            _ => Err(ApiError::bad_request("Parámetros de paginación inválidos")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReadFlagParams {
    leida: Option<String>,
}

async fn list_for_user(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let (page, limit) = params.resolve()?;
    let usuario_id = parse_id(&usuario_id, "ID de usuario inválido")?;

    let options = FindOptions::default()
        .sort_by("fecha", SortOrder::Desc)
        .skip((page - 1).saturating_mul(limit))
        .limit(limit);
    let notifications = state
        .store
        .find(
            collections::NOTIFICATIONS,
            &Filter::new().eq("usuarioId", usuario_id.as_str()),
            &options,
        )
        .await
        .map_err(ApiError::store("Error al obtener las notificaciones"))?;
    Ok(Json(notifications))
}

async fn list_unread(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let usuario_id = parse_id(&usuario_id, "ID de usuario inválido")?;
    let notifications = state
        .store
        .find(
            collections::NOTIFICATIONS,
            &Filter::new()
                .eq("usuarioId", usuario_id.as_str())
                .eq("leida", false),
            &FindOptions::default(),
        )
        .await
        .map_err(ApiError::store("Error al obtener las notificaciones"))?;
    Ok(Json(notifications))
}

async fn list_by_read_flag(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
    Query(params): Query<ReadFlagParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let usuario_id = parse_id(&usuario_id, "ID de usuario inválido")?;
    // anything but "true" selects unread notifications
    let leida = params.leida.as_deref() == Some("true");

    let notifications = state
        .store
        .find(
            collections::NOTIFICATIONS,
            &Filter::new()
                .eq("usuarioId", usuario_id.as_str())
                .eq("leida", leida),
            &FindOptions::default(),
        )
        .await
        .map_err(ApiError::store("Error al obtener las notificaciones por estado"))?;

    if notifications.is_empty() {
        return Err(ApiError::not_found("No se encontraron notificaciones"));
    }
    Ok(Json(notifications))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "ID de notificación inválido")?;
    let set = to_document(&json!({ "leida": true }))
        .map_err(ApiError::store("Error al marcar la notificación como leída"))?;

    let matched = state
        .store
        .update_by_id(collections::NOTIFICATIONS, &id, set)
        .await
        .map_err(ApiError::store("Error al marcar la notificación como leída"))?;
    if !matched {
        return Err(ApiError::not_found(
            "No se encontró la notificación con el ID proporcionado",
        ));
    }

    info!(notification_id = %id, "Notification marked as read");
    Ok(Json(json!({ "message": "Notificación marcada como leída" })))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "ID de notificación inválido")?;
    let deleted = state
        .store
        .delete_by_id(collections::NOTIFICATIONS, &id)
        .await
        .map_err(ApiError::store("Error al eliminar la notificación"))?;
    if !deleted {
        return Err(ApiError::not_found(
            "No se encontró la notificación con el ID proporcionado",
        ));
    }

    info!(notification_id = %id, "Notification deleted");
    Ok(Json(json!({ "message": "Notificación eliminada correctamente" })))
}
