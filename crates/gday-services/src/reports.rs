// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weekly report endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use gday_store::{Document, Filter, FindOptions, SortOrder, collections};

use crate::AppState;
use crate::error::{ApiError, parse_id};

/// Routes of the reports service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reportes/usuario/{usuario_id}", get(list_for_user))
        .with_state(state)
}

/// Weekly aggregates of a user, newest first.
async fn list_for_user(
    State(state): State<AppState>,
    Path(usuario_id): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let usuario_id = parse_id(&usuario_id, "ID de usuario inválido")?;
    let reports = state
        .store
        .find(
            collections::REPORTS,
            &Filter::new().eq("usuarioId", usuario_id.as_str()),
            &FindOptions::default().sort_by("fechaCreacion", SortOrder::Desc),
        )
        .await
        .map_err(ApiError::store("Error al obtener los reportes"))?;
    Ok(Json(reports))
}
