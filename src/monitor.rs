// src/monitor.rs

use crate::job::{ExitPoll, Job};
use crate::process;
use std::sync::Weak;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Supervise one run of a job's transfer tool.
///
/// Holds only a weak reference to the job. Pause and stop cancel `cancel`,
/// after which the task exits without touching the job. When the tool exits
/// on its own the job is resolved to `completed` or `error`.
pub(crate) async fn run(job: Weak<Job>, run: u64, cancel: CancellationToken, collector: JoinHandle<String>) {
    let Some(tick) = job.upgrade().map(|j| j.env().tick_interval) else {
        collector.abort();
        return;
    };
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                collector.abort();
                return;
            }
            _ = ticker.tick() => {}
        }

        let Some(job) = job.upgrade() else {
            collector.abort();
            return;
        };
        match job.poll_exit(run).await {
            ExitPoll::Running => {
                if !job.apply_tick(run).await {
                    collector.abort();
                    return;
                }
            }
            ExitPoll::Exited(status) => break status,
            ExitPoll::Stale => {
                collector.abort();
                return;
            }
            ExitPoll::Failed(e) => {
                tracing::warn!(job_id = %job.id(), "liveness check failed: {}", e);
            }
        }
    };

    let Some(job) = job.upgrade() else {
        collector.abort();
        return;
    };
    tracing::debug!(job_id = %job.id(), run, "tool exited: {}", exit);

    // Exit code is the only completion signal the tools give us.
    if exit.success() || job.progress().await >= 100.0 {
        collector.abort();
        job.complete_run(run).await;
    } else {
        let capture = process::collect_diagnostics(collector, job.env().diagnostic_timeout).await;
        job.fail_run(run, exit, capture).await;
    }
}
