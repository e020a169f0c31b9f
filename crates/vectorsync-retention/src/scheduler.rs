use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vectorsync_common::CancelToken;

use crate::engine::RetentionEngine;
use crate::report::{RetentionReport, SchedulerSummary};

/// Runs retention sweeps on a fixed interval until cancelled.
pub struct RetentionScheduler {
    engine: Arc<RetentionEngine>,
    interval: Duration,
    cancel: CancelToken,
}

impl RetentionScheduler {
    pub fn new(engine: Arc<RetentionEngine>, interval: Duration, cancel: CancelToken) -> Self {
        Self {
            engine,
            interval,
            cancel,
        }
    }

    /// Sweep immediately, then once per interval. Each completed report is
    /// passed to `on_report` as soon as its sweep ends. A failed sweep is
    /// logged and the loop carries on.
    pub async fn run<F>(&self, mut on_report: F) -> SchedulerSummary
    where
        F: FnMut(&RetentionReport),
    {
        let mut summary = SchedulerSummary::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "retention scheduler started, sweeping every {}s",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => break,
            }

            match self.engine.sweep(false).await {
                Ok(report) => {
                    if report.has_errors() {
                        warn!("retention sweep finished with {} errors", report.errors.len());
                    }
                    on_report(&report);
                    summary.record(report);
                }
                Err(e) => {
                    summary.failed_sweeps += 1;
                    warn!("retention sweep failed, retrying next interval: {e}");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        info!(
            "retention scheduler stopped after {} sweeps ({} failed, {} points deleted)",
            summary.sweeps, summary.failed_sweeps, summary.total_deleted
        );
        summary
    }

    /// Run on a background task.
    pub fn spawn<F>(self, on_report: F) -> JoinHandle<SchedulerSummary>
    where
        F: FnMut(&RetentionReport) + Send + 'static,
    {
        tokio::spawn(async move { self.run(on_report).await })
    }
}
