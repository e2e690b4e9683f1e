// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request router tests against mock backends.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gday_gateway::{GATEWAY_ERROR_MESSAGE, ServiceEntry, ServiceRegistry, proxy};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn gateway(entries: Vec<ServiceEntry>) -> Router {
    let registry = ServiceRegistry::new(entries).unwrap();
    proxy::router(&registry, client())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, body.to_vec())
}

#[tokio::test]
async fn test_forwards_method_query_and_body() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notificaciones/abc"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "5"))
        .and(body_json(json!({ "leida": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": 1 })))
        .expect(1)
        .mount(&backend)
        .await;

    let app = gateway(vec![ServiceEntry::new(
        "notificaciones",
        "/notificaciones",
        backend.uri(),
    )]);
    let (status, content_type, body) = send(
        app,
        Request::post("/notificaciones/abc?page=2&limit=5")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"leida":true}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "ok": 1 }));
}

#[tokio::test]
async fn test_mirrors_error_status_and_body_verbatim() {
    let backend = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/horario_sueno/0123456789abcdef01234567"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_raw("no existe", "text/plain; charset=utf-8"),
        )
        .mount(&backend)
        .await;

    let app = gateway(vec![ServiceEntry::new(
        "horario_sueno",
        "/horario_sueno",
        backend.uri(),
    )]);
    let (status, content_type, body) = send(
        app,
        Request::delete("/horario_sueno/0123456789abcdef01234567")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert_eq!(body, b"no existe");
}

#[tokio::test]
async fn test_missing_content_type_defaults_to_json() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reportes"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"[]".to_vec()))
        .mount(&backend)
        .await;

    let app = gateway(vec![ServiceEntry::new("reportes", "/reportes", backend.uri())]);
    let (status, content_type, body) =
        send(app, Request::get("/reportes").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, b"[]");
}

#[tokio::test]
async fn test_strip_prefix_forwards_remainder() {
    let backend = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/perfil/42"))
        .and(body_string("nombre=Ana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
        .expect(1)
        .mount(&backend)
        .await;

    let app = gateway(vec![
        ServiceEntry::new("usuarios", "/usuarios", backend.uri()).stripping_prefix(),
    ]);
    let (status, _, body) = send(
        app,
        Request::put("/usuarios/perfil/42")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("nombre=Ana"))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "id": 42 }));
}

#[tokio::test]
async fn test_prefixes_route_independently() {
    let reportes = MockServer::start().await;
    let clases = MockServer::start().await;
    Mock::given(path("/reportes/usuario/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["reporte"])))
        .mount(&reportes)
        .await;
    Mock::given(path("/clases/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "clase": "c1" })))
        .mount(&clases)
        .await;

    let app = gateway(vec![
        ServiceEntry::new("reportes", "/reportes", reportes.uri()),
        ServiceEntry::new("clases", "/clases", clases.uri()),
    ]);

    let (_, _, body) = send(
        app.clone(),
        Request::get("/reportes/usuario/u1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!(["reporte"]));

    let (_, _, body) = send(app, Request::get("/clases/c1").body(Body::empty()).unwrap()).await;
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "clase": "c1" }));
}

#[tokio::test]
async fn test_unreachable_backend_returns_gateway_error() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let app = gateway(vec![ServiceEntry::new(
        "actividades",
        "/actividades",
        format!("http://127.0.0.1:{}", port),
    )]);
    let (status, _, body) = send(
        app,
        Request::get("/actividades/usuario/1").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({ "message": GATEWAY_ERROR_MESSAGE })
    );
}

#[tokio::test]
async fn test_unknown_prefix_is_not_found() {
    let backend = MockServer::start().await;
    let app = gateway(vec![ServiceEntry::new("reportes", "/reportes", backend.uri())]);

    for uri in ["/desconocido", "/reportesx/1", "/"] {
        let (status, _, _) = send(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert!(backend.received_requests().await.unwrap().is_empty());
}
