// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend process supervisor.
//!
//! Launches each service that has an entry point and watches it until it
//! exits. There is no restart policy: a service that exits stays down until
//! the gateway is restarted.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`traits`] | `Launcher` and `ChildProcess` seams, `LaunchError` |
//! | [`process`] | `ProcessLauncher` over tokio processes |
//! | [`mock`] | `MockLauncher` for tests |

pub mod mock;
pub mod process;
pub mod traits;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub use mock::MockLauncher;
pub use process::ProcessLauncher;
pub use traits::{ChildProcess, LaunchError, Launcher};

use crate::registry::{EntryPoint, ServiceRegistry};

/// Lifecycle of a supervised service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Launch in progress.
    Starting,
    /// Child process alive.
    Running {
        /// OS process id, if known.
        pid: Option<u32>,
    },
    /// Child process ended. `code` is `None` when it was killed or ended by a
    /// signal.
    Exited {
        /// Exit code.
        code: Option<i32>,
    },
    /// The process could not be launched.
    FailedToStart {
        /// Launch error.
        reason: String,
    },
}

impl ServiceState {
    /// Whether the service has a live child.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Handle returned for a launched service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Service name.
    pub service: String,
    /// OS process id, if known.
    pub pid: Option<u32>,
}

enum MonitorEvent {
    Exited(std::io::Result<Option<i32>>),
    Stop,
}

type States = Arc<RwLock<BTreeMap<String, ServiceState>>>;

/// Supervises backend service processes.
pub struct Supervisor {
    launcher: Arc<dyn Launcher>,
    states: States,
    stop: watch::Sender<bool>,
    monitors: Mutex<JoinSet<()>>,
}

impl Supervisor {
    /// Create a supervisor launching through `launcher`.
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            launcher,
            states: Arc::new(RwLock::new(BTreeMap::new())),
            stop,
            monitors: Mutex::new(JoinSet::new()),
        }
    }

    /// Launch `service` and start watching it. Does not wait for the child.
    ///
    /// A failed launch is recorded as [`ServiceState::FailedToStart`].
    pub async fn start(
        &self,
        service: &str,
        entry_point: &EntryPoint,
    ) -> Result<ProcessHandle, LaunchError> {
        {
            let mut states = self.states.write().await;
            if matches!(
                states.get(service),
                Some(ServiceState::Starting | ServiceState::Running { .. })
            ) {
                return Err(LaunchError::AlreadyStarted(service.to_string()));
            }
            states.insert(service.to_string(), ServiceState::Starting);
        }

        info!(
            service = %service,
            command = %entry_point,
            launcher = self.launcher.launcher_type(),
            "Starting service"
        );

        let child = match self.launcher.launch(service, entry_point).await {
            Ok(child) => child,
            Err(e) => {
                error!(service = %service, error = %e, "Failed to start service");
                self.states.write().await.insert(
                    service.to_string(),
                    ServiceState::FailedToStart {
                        reason: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        let pid = child.pid();
        self.states
            .write()
            .await
            .insert(service.to_string(), ServiceState::Running { pid });
        info!(service = %service, pid = ?pid, "Service started");

        self.monitors.lock().await.spawn(monitor(
            service.to_string(),
            child,
            self.stop.subscribe(),
            self.states.clone(),
        ));

        Ok(ProcessHandle {
            service: service.to_string(),
            pid,
        })
    }

    /// Launch every service of `registry` that has an entry point.
    ///
    /// Launch failures are logged and do not stop the remaining launches.
    /// Returns the number of services started.
    pub async fn start_all(&self, registry: &ServiceRegistry) -> usize {
        let mut started = 0;
        for (entry, entry_point) in registry.launchable() {
            if self.start(&entry.name, entry_point).await.is_ok() {
                started += 1;
            }
        }
        started
    }

    /// Current state of `service`, if it was ever started.
    pub async fn state(&self, service: &str) -> Option<ServiceState> {
        self.states.read().await.get(service).cloned()
    }

    /// States of all services ever started, by name.
    pub async fn states(&self) -> BTreeMap<String, ServiceState> {
        self.states.read().await.clone()
    }

    /// Kill every running child and wait for the monitors to finish.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let mut monitors = self.monitors.lock().await;
        while let Some(result) = monitors.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Service monitor task failed");
            }
        }
        info!("Supervisor stopped");
    }
}

async fn monitor(
    service: String,
    mut child: Box<dyn ChildProcess>,
    mut stop: watch::Receiver<bool>,
    states: States,
) {
    let event = tokio::select! {
        result = child.wait() => MonitorEvent::Exited(result),
        _ = stop.wait_for(|stopping| *stopping) => MonitorEvent::Stop,
    };

    let code = match event {
        MonitorEvent::Exited(Ok(Some(0))) => {
            info!(service = %service, exit_code = 0, "Service exited");
            Some(0)
        }
        MonitorEvent::Exited(Ok(Some(code))) => {
            warn!(service = %service, exit_code = code, "Service exited");
            Some(code)
        }
        MonitorEvent::Exited(Ok(None)) => {
            warn!(service = %service, "Service terminated by signal");
            None
        }
        MonitorEvent::Exited(Err(e)) => {
            error!(service = %service, error = %e, "Failed to wait for service");
            None
        }
        MonitorEvent::Stop => {
            child.kill().await;
            info!(service = %service, "Service stopped");
            None
        }
    };

    states
        .write()
        .await
        .insert(service, ServiceState::Exited { code });
}
