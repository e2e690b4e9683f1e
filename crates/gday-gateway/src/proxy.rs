// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request router.
//!
//! Every registry prefix gets a catch-all route that forwards the request to
//! the service's base URL and mirrors the backend response. Paths outside the
//! registered prefixes fall through to axum's default 404.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{ProxyError, panic_response};
use crate::registry::{ServiceEntry, ServiceRegistry};

#[derive(Clone)]
struct ProxyState {
    entry: Arc<ServiceEntry>,
    client: reqwest::Client,
}

/// Build the gateway router for `registry`, forwarding through `client`.
pub fn router(registry: &ServiceRegistry, client: reqwest::Client) -> Router {
    let mut router = Router::new();
    for entry in registry.entries() {
        let state = ProxyState {
            entry: Arc::new(entry.clone()),
            client: client.clone(),
        };
        let prefix = entry.prefix.as_str();
        let routes = Router::new()
            .route(prefix, any(forward))
            .route(&format!("{}/", prefix), any(forward))
            .route(&format!("{}/{{*rest}}", prefix), any(forward))
            .with_state(state);
        router = router.merge(routes);
    }
    with_layers(router)
}

/// Request tracing, permissive CORS and the gateway envelope for panics.
fn with_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn forward(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let entry = &state.entry;
    let url = entry.target_url(uri.path(), uri.query());
    debug!(service = %entry.name, method = %method, url = %url, "Forwarding request");

    let transport = |source| ProxyError::Transport {
        service: entry.name.clone(),
        url: url.clone(),
        source,
    };

    let mut request = state.client.request(method, &url).body(body);
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        request = request.header(CONTENT_TYPE, content_type.clone());
    }

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let body = response.bytes().await.map_err(transport)?;

    Ok((status, [(CONTENT_TYPE, content_type)], body).into_response())
}
