// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock launcher for testing.
//!
//! Simulates children that run until killed, or exit on their own after a
//! delay, without spawning processes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::traits::{ChildProcess, LaunchError, Launcher, Result};
use crate::registry::EntryPoint;

#[derive(Debug, Clone, Copy)]
struct Exit {
    code: i32,
    after: Duration,
}

#[derive(Debug, Clone)]
struct Launched {
    entry_point: EntryPoint,
    killed: Arc<AtomicBool>,
}

/// Mock launcher for testing.
#[derive(Default)]
pub struct MockLauncher {
    failing: HashSet<String>,
    exits: HashMap<String, Exit>,
    launched: Mutex<Vec<(String, Launched)>>,
    next_pid: AtomicU32,
}

impl MockLauncher {
    /// Create a mock launcher whose children run until killed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make spawning `service` fail.
    pub fn failing(mut self, service: &str) -> Self {
        self.failing.insert(service.to_string());
        self
    }

    /// Make `service` exit with `code` after `after`.
    pub fn exit_after(mut self, service: &str, code: i32, after: Duration) -> Self {
        self.exits.insert(service.to_string(), Exit { code, after });
        self
    }

    /// Services launched so far, with their entry points, in launch order.
    pub async fn launched(&self) -> Vec<(String, EntryPoint)> {
        self.launched
            .lock()
            .await
            .iter()
            .map(|(name, l)| (name.clone(), l.entry_point.clone()))
            .collect()
    }

    /// Whether the most recent child of `service` was killed.
    pub async fn was_killed(&self, service: &str) -> bool {
        self.launched
            .lock()
            .await
            .iter()
            .rev()
            .find(|(name, _)| name == service)
            .is_some_and(|(_, l)| l.killed.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    fn launcher_type(&self) -> &'static str {
        "mock"
    }

    async fn launch(
        &self,
        service: &str,
        entry_point: &EntryPoint,
    ) -> Result<Box<dyn ChildProcess>> {
        if self.failing.contains(service) {
            return Err(LaunchError::Spawn {
                service: service.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }

        let killed = Arc::new(AtomicBool::new(false));
        self.launched.lock().await.push((
            service.to_string(),
            Launched {
                entry_point: entry_point.clone(),
                killed: killed.clone(),
            },
        ));

        Ok(Box::new(MockChild {
            pid: 10_000 + self.next_pid.fetch_add(1, Ordering::SeqCst),
            exit: self.exits.get(service).copied(),
            killed,
            kill_signal: Arc::new(Notify::new()),
        }))
    }
}

struct MockChild {
    pid: u32,
    exit: Option<Exit>,
    killed: Arc<AtomicBool>,
    kill_signal: Arc<Notify>,
}

#[async_trait]
impl ChildProcess for MockChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        if self.killed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.exit {
            Some(exit) => tokio::select! {
                _ = tokio::time::sleep(exit.after) => Ok(Some(exit.code)),
                _ = self.kill_signal.notified() => Ok(None),
            },
            None => {
                self.kill_signal.notified().await;
                Ok(None)
            }
        }
    }

    async fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
        self.kill_signal.notify_one();
    }
}
