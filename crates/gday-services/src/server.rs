// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service bootstrap: store, HTTP listener and embedded job.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use gday_jobs::{
    ActivityNotificationJob, Job, JobHandle, JobRunner, SleepReminderJob, WeeklyReportJob,
};
use gday_store::{DocumentStore, StoreError};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ServiceConfig, ServiceKind};
use crate::error::panic_response;
use crate::{AppState, notifications, reports, sleep_schedules};

/// Errors raised while starting a service.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The store could not be opened.
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Bind error.
        source: std::io::Error,
    },
}

/// HTTP routes of `kind`, with the layers of [`with_layers`].
pub fn router(kind: ServiceKind, state: AppState) -> Router {
    let routes = match kind {
        ServiceKind::Notifications => notifications::router(state),
        ServiceKind::Reports => reports::router(state),
        ServiceKind::SleepSchedules => sleep_schedules::router(state),
    };
    with_layers(routes)
}

/// Request tracing, permissive CORS and a JSON 500 for handler panics.
pub fn with_layers(routes: Router) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// The job embedded in `kind`.
pub fn job_for(kind: ServiceKind, store: Arc<dyn DocumentStore>) -> Arc<dyn Job> {
    match kind {
        ServiceKind::Notifications => Arc::new(ActivityNotificationJob::new(store)),
        ServiceKind::Reports => Arc::new(WeeklyReportJob::new(store)),
        ServiceKind::SleepSchedules => Arc::new(SleepReminderJob::new(store)),
    }
}

/// A started service.
pub struct RunningService {
    addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
    shutdown: Arc<Notify>,
    job: JobHandle,
}

impl RunningService {
    /// Start the service described by `config`: open the store, start the
    /// job runner and serve HTTP on the configured address.
    pub async fn start(config: &ServiceConfig) -> Result<Self, StartError> {
        let store = gday_store::open(&config.database_url).await?;
        info!(backend = store.backend(), "Store opened");
        Self::start_with_store(config, store).await
    }

    /// Start the service over an already opened store.
    pub async fn start_with_store(
        config: &ServiceConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, StartError> {
        let listener = TcpListener::bind(config.http_addr)
            .await
            .map_err(|source| StartError::Bind {
                addr: config.http_addr,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| StartError::Bind {
            addr: config.http_addr,
            source,
        })?;

        let job = JobRunner::new(job_for(config.kind, store.clone()), config.schedule.clone()).spawn();

        let app = router(config.kind, AppState::new(store));
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await })
                .await
        });

        info!(service = config.kind.name(), addr = %addr, schedule = %config.schedule, "Service listening");

        Ok(Self {
            addr,
            server,
            shutdown,
            job,
        })
    }

    /// Address the HTTP server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests, stop the job runner and wait for both.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
            Err(e) => error!(error = %e, "HTTP server task failed"),
        }
        self.job.shutdown().await;
        info!("Service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gday_jobs::Schedule;
    use gday_store::MemoryStore;
    use std::time::Duration;

    async fn boom() -> &'static str {
        panic!("handler bug")
    }

    #[tokio::test]
    async fn test_handler_panic_answers_json_500() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::routing::get;
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        let app = with_layers(Router::new().route("/boom", get(boom)));
        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "message": crate::error::INTERNAL_ERROR_MESSAGE })
        );
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let config = ServiceConfig {
            kind: ServiceKind::Reports,
            database_url: "memory".to_string(),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            schedule: Schedule::every(Duration::from_secs(3600)),
        };
        let service = RunningService::start_with_store(&config, Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        assert_ne!(service.addr().port(), 0);

        let stream = tokio::net::TcpStream::connect(service.addr()).await;
        assert!(stream.is_ok());
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), service.shutdown())
            .await
            .unwrap();
    }
}
