// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway HTTP errors.

use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Body message returned when a backend cannot be reached.
pub const GATEWAY_ERROR_MESSAGE: &str = "Error en el Gateway";

/// Errors raised while forwarding a request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProxyError {
    /// The outbound request failed: connection refused, timeout, bad URL or
    /// an interrupted response body.
    #[error("Failed to forward to {service} ({url}): {source}")]
    Transport {
        /// Target service.
        service: String,
        /// Target URL.
        url: String,
        /// Client error.
        source: reqwest::Error,
    },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error!(error = %self, "Gateway forward failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": GATEWAY_ERROR_MESSAGE })),
        )
            .into_response()
    }
}

/// Last-resort responder for handler panics, used with
/// `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message: &str = if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    };
    error!(panic = message, "Gateway handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": GATEWAY_ERROR_MESSAGE })),
    )
        .into_response()
}
