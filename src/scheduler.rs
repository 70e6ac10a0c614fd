// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The leadmarket-rs authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Interval scheduler for background jobs.
//!
//! Jobs are plain injected values behind the [`Job`] trait, registered by
//! name with an interval. [`Scheduler::tick`] runs one job immediately,
//! which is how tests and operational tooling trigger a run without
//! waiting out the interval. There is no global state: every scheduler
//! owns its own job table and shutdown channel.

use crate::topup::AutoTopUpSweeper;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A named background job.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// One run. Must not panic; errors are the job's own to log.
    async fn run(&self);
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    every: Duration,
}

/// Runs registered jobs on their intervals until stopped.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn Job>, every: Duration) {
        self.jobs.push(ScheduledJob { job, every });
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Runs the named job once, immediately. Returns false when no job by
    /// that name is registered.
    pub async fn tick(&self, name: &str) -> bool {
        let Some(scheduled) = self.jobs.iter().find(|s| s.job.name() == name) else {
            return false;
        };
        scheduled.job.run().await;
        true
    }

    /// Spawns one interval task per registered job. The first run happens a
    /// full interval after start. Calling start twice is a no-op.
    pub fn start(&mut self) {
        if self.shutdown.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        for scheduled in &self.jobs {
            let job = Arc::clone(&scheduled.job);
            let every = scheduled.every;
            let mut rx = rx.clone();
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // interval fires immediately on creation; swallow that tick
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            tracing::debug!(job = job.name(), "scheduled job running");
                            job.run().await;
                        }
                        changed = rx.changed() => {
                            if changed.is_err() || *rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                tracing::debug!(job = job.name(), "scheduled job stopped");
            });
            self.handles.push(handle);
        }
        self.shutdown = Some(tx);
    }

    /// Signals shutdown and waits for every job task to finish its current
    /// run. Safe to call when not running.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Scheduler binding for the auto top-up sweep.
pub struct AutoTopUpJob {
    sweeper: Arc<AutoTopUpSweeper>,
}

impl AutoTopUpJob {
    pub const NAME: &'static str = "auto_top_up";

    pub fn new(sweeper: Arc<AutoTopUpSweeper>) -> Self {
        Self { sweeper }
    }
}

#[async_trait]
impl Job for AutoTopUpJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) {
        self.sweeper.run_sweep().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    impl CountingJob {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn tick_runs_a_job_by_name() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::clone(&job) as Arc<dyn Job>, Duration::from_secs(3600));

        assert!(scheduler.tick("counting").await);
        assert!(scheduler.tick("counting").await);
        assert_eq!(job.runs(), 2);

        assert!(!scheduler.tick("unknown").await);
    }

    #[tokio::test(start_paused = true)]
    async fn started_scheduler_runs_jobs_on_interval() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::clone(&job) as Arc<dyn Job>, Duration::from_secs(60));
        scheduler.start();
        assert!(scheduler.is_running());

        // nothing runs before the first full interval
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(job.runs(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(job.runs() >= 2);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        let after_stop = job.runs();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(job.runs(), after_stop);
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let mut scheduler = Scheduler::new();
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn start_twice_is_a_no_op() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::clone(&job) as Arc<dyn Job>, Duration::from_secs(60));
        scheduler.start();
        scheduler.start();
        assert_eq!(scheduler.handles.len(), 1);
        scheduler.stop().await;
    }
}
