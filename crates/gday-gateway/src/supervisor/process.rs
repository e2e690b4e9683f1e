// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launcher backed by OS processes.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use super::traits::{ChildProcess, LaunchError, Launcher, Result};
use crate::registry::EntryPoint;

/// Launches entry points as child processes of the gateway.
///
/// Children inherit the gateway environment and working directory. Their
/// stdout is relayed at `info`, stderr at `warn`.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Create a process launcher.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn launcher_type(&self) -> &'static str {
        "process"
    }

    async fn launch(
        &self,
        service: &str,
        entry_point: &EntryPoint,
    ) -> Result<Box<dyn ChildProcess>> {
        let mut cmd = Command::new(&entry_point.program);
        cmd.args(&entry_point.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            service: service.to_string(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_output(service.to_string(), Stream::Stdout, stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_output(service.to_string(), Stream::Stderr, stderr));
        }

        Ok(Box::new(ProcessChild { child }))
    }
}

struct ProcessChild {
    child: Child,
}

#[async_trait]
impl ChildProcess for ProcessChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to kill child process");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn relay_output<R>(service: String, stream: Stream, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                match stream {
                    Stream::Stdout => info!(service = %service, "{}", line),
                    Stream::Stderr => warn!(service = %service, "{}", line),
                }
            }
            Err(e) => {
                warn!(service = %service, error = %e, "Output relay stopped");
                return;
            }
        }
    }
}
