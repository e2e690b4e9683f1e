// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor tests.

use std::sync::Arc;
use std::time::Duration;

use gday_gateway::supervisor::{LaunchError, MockLauncher, ProcessLauncher};
use gday_gateway::{EntryPoint, ServiceEntry, ServiceRegistry, ServiceState, Supervisor};

fn registry() -> ServiceRegistry {
    ServiceRegistry::new(vec![
        ServiceEntry::new("usuarios", "/usuarios", "http://127.0.0.1:3002"),
        ServiceEntry::new("reportes", "/reportes", "http://127.0.0.1:3005")
            .with_entry_point(EntryPoint::new("gday-reportes")),
        ServiceEntry::new("notificaciones", "/notificaciones", "http://127.0.0.1:3004")
            .with_entry_point(EntryPoint::new("gday-notificaciones")),
        ServiceEntry::new("horario_sueno", "/horario_sueno", "http://127.0.0.1:3008")
            .with_entry_point(EntryPoint::new("gday-horario-sueno").arg("--verbose")),
    ])
    .unwrap()
}

async fn wait_for_state(supervisor: &Supervisor, service: &str, expected: ServiceState) {
    for _ in 0..200 {
        if supervisor.state(service).await.as_ref() == Some(&expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{service} never reached {expected:?}, last state {:?}",
        supervisor.state(service).await
    );
}

#[tokio::test]
async fn test_spawn_failure_does_not_block_other_services() {
    let launcher = Arc::new(MockLauncher::new().failing("notificaciones"));
    let supervisor = Supervisor::new(launcher.clone());

    let started = supervisor.start_all(&registry()).await;
    assert_eq!(started, 2);

    let launched: Vec<String> = launcher
        .launched()
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(launched, ["reportes", "horario_sueno"]);

    let states = supervisor.states().await;
    assert!(states["reportes"].is_running());
    assert!(states["horario_sueno"].is_running());
    assert!(matches!(
        &states["notificaciones"],
        ServiceState::FailedToStart { reason } if reason.contains("notificaciones")
    ));
    // routed but never launched
    assert!(!states.contains_key("usuarios"));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_entry_point_is_passed_to_launcher() {
    let launcher = Arc::new(MockLauncher::new());
    let supervisor = Supervisor::new(launcher.clone());
    supervisor.start_all(&registry()).await;

    let launched = launcher.launched().await;
    let (_, entry_point) = launched
        .iter()
        .find(|(name, _)| name == "horario_sueno")
        .unwrap();
    assert_eq!(entry_point.to_string(), "gday-horario-sueno --verbose");

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_exit_code_is_observed_without_restart() {
    let launcher = Arc::new(MockLauncher::new().exit_after("reportes", 3, Duration::from_millis(20)));
    let supervisor = Supervisor::new(launcher.clone());

    let handle = supervisor
        .start("reportes", &EntryPoint::new("gday-reportes"))
        .await
        .unwrap();
    assert_eq!(handle.service, "reportes");
    assert!(handle.pid.is_some());

    wait_for_state(&supervisor, "reportes", ServiceState::Exited { code: Some(3) }).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(launcher.launched().await.len(), 1);
    assert!(!launcher.was_killed("reportes").await);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_kills_running_children() {
    let launcher = Arc::new(MockLauncher::new());
    let supervisor = Supervisor::new(launcher.clone());
    supervisor.start_all(&registry()).await;

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();

    for service in ["reportes", "notificaciones", "horario_sueno"] {
        assert!(launcher.was_killed(service).await, "{service}");
        assert_eq!(
            supervisor.state(service).await,
            Some(ServiceState::Exited { code: None })
        );
    }
}

#[tokio::test]
async fn test_running_service_cannot_be_started_twice() {
    let supervisor = Supervisor::new(Arc::new(MockLauncher::new()));
    let entry_point = EntryPoint::new("gday-reportes");

    supervisor.start("reportes", &entry_point).await.unwrap();
    let err = supervisor.start("reportes", &entry_point).await.unwrap_err();
    assert!(matches!(err, LaunchError::AlreadyStarted(name) if name == "reportes"));

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_missing_program_fails_to_start() {
    let supervisor = Supervisor::new(Arc::new(ProcessLauncher::new()));

    let err = supervisor
        .start("clases", &EntryPoint::new("/nonexistent/gday-clases"))
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::Spawn { .. }));
    assert!(matches!(
        supervisor.state("clases").await,
        Some(ServiceState::FailedToStart { .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_exit_code_is_observed() {
    let supervisor = Supervisor::new(Arc::new(ProcessLauncher::new()));

    supervisor
        .start(
            "clases",
            &EntryPoint::new("sh").arg("-c").arg("echo listo; exit 3"),
        )
        .await
        .unwrap();

    wait_for_state(&supervisor, "clases", ServiceState::Exited { code: Some(3) }).await;
    supervisor.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_is_killed_on_shutdown() {
    let supervisor = Supervisor::new(Arc::new(ProcessLauncher::new()));

    supervisor
        .start("clases", &EntryPoint::new("sleep").arg("30"))
        .await
        .unwrap();
    assert!(supervisor.state("clases").await.unwrap().is_running());

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();
    assert_eq!(
        supervisor.state("clases").await,
        Some(ServiceState::Exited { code: None })
    );
}
