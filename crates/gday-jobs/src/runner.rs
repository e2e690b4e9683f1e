// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job trait, run-lock and scheduling loop.
//!
//! Every tick spawns the job on its own task, so a slow scan never delays
//! the next tick computation. The run-lock turns a tick that arrives while
//! the previous run is still going into a logged no-op.

use std::ops::AddAssign;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::sync::{Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::schedule::Schedule;

/// Counters describing one job invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Source records examined.
    pub scanned: usize,
    /// Derived records written.
    pub created: usize,
    /// Derived records not written because their dedup key already exists.
    pub skipped: usize,
    /// Source records that could not be processed.
    pub failed: usize,
}

impl AddAssign for JobReport {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.created += other.created;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Observable state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for the next tick.
    Idle,
    /// A run is in progress.
    Running,
}

/// A batch computation triggered by a [`JobRunner`].
#[async_trait]
pub trait Job: Send + Sync {
    /// Job name used in logs.
    fn name(&self) -> &'static str;

    /// Run one batch as of the local wall-clock time `now`.
    ///
    /// Per-record failures are counted in the report; an `Err` means the
    /// batch as a whole could not run.
    async fn run(&self, now: NaiveDateTime) -> Result<JobReport>;
}

/// Triggers a [`Job`] on a [`Schedule`].
pub struct JobRunner {
    job: Arc<dyn Job>,
    schedule: Schedule,
    run_lock: Mutex<()>,
    running: AtomicBool,
    shutdown: Arc<Notify>,
}

impl JobRunner {
    /// Create a runner for `job`.
    pub fn new(job: Arc<dyn Job>, schedule: Schedule) -> Self {
        Self {
            job,
            schedule,
            run_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Name of the wrapped job.
    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    /// Schedule the runner fires on.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Whether a run is in progress.
    pub fn state(&self) -> JobState {
        if self.running.load(Ordering::SeqCst) {
            JobState::Running
        } else {
            JobState::Idle
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the job once, unless a run is already in progress.
    ///
    /// Returns `None` when the tick was skipped because of the run-lock.
    pub async fn trigger(&self, now: NaiveDateTime) -> Option<Result<JobReport>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!(job = self.job.name(), "Previous run still in progress, skipping tick");
            return None;
        };

        self.running.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let result = self.job.run(now).await;
        self.running.store(false, Ordering::SeqCst);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(report) if report.created > 0 || report.failed > 0 => info!(
                job = self.job.name(),
                scanned = report.scanned,
                created = report.created,
                skipped = report.skipped,
                failed = report.failed,
                duration_ms,
                "Job run completed"
            ),
            Ok(report) => debug!(
                job = self.job.name(),
                scanned = report.scanned,
                skipped = report.skipped,
                duration_ms,
                "Job run completed, nothing new"
            ),
            Err(e) => error!(job = self.job.name(), error = %e, duration_ms, "Job run failed"),
        }

        Some(result)
    }

    /// Run the scheduling loop until shutdown is signalled.
    ///
    /// On shutdown no new runs start and the loop waits for the run in
    /// progress, if any.
    pub async fn run(self: Arc<Self>) {
        info!(job = self.job.name(), schedule = %self.schedule, "Job runner started");

        let mut in_flight = JoinSet::new();

        loop {
            let delay = match self.schedule.delay_from(Local::now()) {
                Ok(delay) => delay,
                Err(e) => {
                    error!(job = self.job.name(), error = %e, "No next occurrence, stopping runner");
                    break;
                }
            };

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!(job = self.job.name(), "Job runner received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(delay) => {
                    let runner = self.clone();
                    in_flight.spawn(async move {
                        let now = Local::now().naive_local();
                        runner.trigger(now).await;
                    });
                }
            }

            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}

        info!(job = self.job.name(), "Job runner stopped");
    }

    /// Spawn the scheduling loop on the current runtime.
    pub fn spawn(self) -> JobHandle {
        let runner = Arc::new(self);
        let shutdown = runner.shutdown_handle();
        let join = tokio::spawn(runner.clone().run());
        JobHandle {
            runner,
            shutdown,
            join,
        }
    }
}

/// Handle to a spawned [`JobRunner`].
pub struct JobHandle {
    runner: Arc<JobRunner>,
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl JobHandle {
    /// The running job runner.
    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    /// Stop the loop and wait for the run in progress.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            error!(job = self.runner.name(), error = %e, "Job runner task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::error::JobError;

    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _now: NaiveDateTime) -> Result<JobReport> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(JobReport {
                scanned: 1,
                ..JobReport::default()
            })
        }
    }

    struct BlockingJob {
        release: Notify,
    }

    #[async_trait]
    impl Job for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        async fn run(&self, _now: NaiveDateTime) -> Result<JobReport> {
            self.release.notified().await;
            Ok(JobReport::default())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _now: NaiveDateTime) -> Result<JobReport> {
            Err(JobError::InvalidRecord("boom".to_string()))
        }
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    #[test]
    fn test_report_add_assign() {
        let mut total = JobReport::default();
        total += JobReport {
            scanned: 2,
            created: 1,
            skipped: 1,
            failed: 0,
        };
        total += JobReport {
            scanned: 1,
            created: 0,
            skipped: 0,
            failed: 1,
        };
        assert_eq!(
            total,
            JobReport {
                scanned: 3,
                created: 1,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_trigger_runs_job() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let runner = JobRunner::new(job.clone(), Schedule::every(Duration::from_secs(60)));

        let report = runner.trigger(now()).await.unwrap().unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(runner.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_trigger_propagates_batch_error() {
        let runner = JobRunner::new(Arc::new(FailingJob), Schedule::every(Duration::from_secs(60)));
        let result = runner.trigger(now()).await.unwrap();
        assert!(result.is_err());
        assert_eq!(runner.state(), JobState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_lock_skips_overlapping_trigger() {
        let job = Arc::new(BlockingJob {
            release: Notify::new(),
        });
        let runner = Arc::new(JobRunner::new(
            job.clone(),
            Schedule::every(Duration::from_secs(60)),
        ));

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.trigger(now()).await })
        };

        // Wait until the first run holds the lock
        for _ in 0..200 {
            if runner.state() == JobState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(runner.state(), JobState::Running);

        let second = runner.trigger(now()).await;
        assert!(second.is_none(), "overlapping trigger must be skipped");

        job.release.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, Some(Ok(_))));
        assert_eq!(runner.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_spawned_runner_ticks_until_shutdown() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let handle =
            JobRunner::new(job.clone(), Schedule::every(Duration::from_millis(20))).spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        let runs = job.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two runs, got {}", runs);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs, "no runs after shutdown");
    }
}
