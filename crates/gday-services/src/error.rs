// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP error type shared by every service.
//!
//! Every error renders as `{"message": "..."}`. Store failures are logged
//! with their cause and answered with a fixed message.

use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gday_store::{RecordId, StoreError};
use serde_json::json;
use thiserror::Error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Invalid input (400).
    #[error("{0}")]
    BadRequest(String),

    /// No matching record (404).
    #[error("{0}")]
    NotFound(String),

    /// The store failed (500).
    #[error("{message}: {source}")]
    Store {
        /// Message sent to the client.
        message: &'static str,
        /// Underlying failure, logged only.
        source: StoreError,
    },
}

impl ApiError {
    /// 400 with `message`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// 404 with `message`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Map a store failure to a 500 answered with `message`.
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { message, source }
    }

    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::BadRequest(message) | Self::NotFound(message) => message.clone(),
            Self::Store { message, source } => {
                tracing::error!(error = %source, "{}", message);
                message.to_string()
            }
        };
        (self.status(), Json(json!({ "message": message }))).into_response()
    }
}

/// Message of the 500 answered when a handler panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor";

/// Last-resort responder for handler panics, used with
/// `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = panic_message(panic.as_ref()), "Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    }
}

/// Parse a path id, answering 400 with `message` when it is malformed.
pub fn parse_id(raw: &str, message: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|_| ApiError::bad_request(message))
}
