//! Bulk scan dispatch.
//!
//! Hosts are fanned out to probe tasks under a semaphore; finished outcomes
//! come back over a bounded channel and are persisted one at a time in
//! completion order.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};

use minerscan_core::{Host, ProbeStatus, RunMode, RunRecord, ScanOutcome};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::persist::ResultSink;
use crate::prober::Probe;

/// Running counts for the current scan, readable from any task.
#[derive(Debug, Default)]
pub struct ScanProgress {
    total: AtomicUsize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    persist_failures: AtomicUsize,
}

/// Point-in-time copy of [`ScanProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub persist_failures: usize,
}

impl ScanProgress {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.persist_failures.store(0, Ordering::Relaxed);
    }

    /// Count one outcome; returns the new processed total.
    fn observe(&self, status: ProbeStatus) -> usize {
        match status {
            ProbeStatus::Success => self.succeeded.fetch_add(1, Ordering::Relaxed),
            ProbeStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Drives a prober across a host set with bounded concurrency.
pub struct Scanner {
    concurrency: usize,
    progress_every: usize,
    progress: Arc<ScanProgress>,
}

impl Scanner {
    pub fn new(concurrency: usize, progress_every: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            progress_every: progress_every.max(1),
            progress: Arc::new(ScanProgress::default()),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.concurrency, config.progress_every)
    }

    /// Shared progress counters for the current or last run.
    pub fn progress(&self) -> Arc<ScanProgress> {
        self.progress.clone()
    }

    /// Probe every host once and record each outcome as it completes.
    ///
    /// When `shutdown` resolves, no further hosts are dispatched; probes already
    /// in flight still finish and are recorded. The returned record reflects
    /// what was actually processed and is also handed to the sink.
    pub async fn run<P, S, F>(
        &self,
        prober: Arc<P>,
        sink: &S,
        hosts: Vec<Host>,
        shutdown: F,
    ) -> RunRecord
    where
        P: Probe + ?Sized + 'static,
        S: ResultSink + ?Sized,
        F: Future<Output = ()>,
    {
        let mut record = RunRecord::begin(RunMode::Bulk, hosts.len());
        self.progress.reset(hosts.len());

        tracing::info!(
            run_id = %record.run_id,
            hosts = hosts.len(),
            concurrency = self.concurrency,
            "Starting scan run"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<ScanOutcome>(self.concurrency);

        let dispatch = async move {
            tokio::pin!(shutdown);

            for host in hosts {
                let permit = tokio::select! {
                    biased;
                    _ = &mut shutdown => return true,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return true,
                    },
                };

                let prober = prober.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = probe_isolated(prober, host).await;
                    drop(permit);
                    // Receiver only disappears if the run itself was dropped.
                    let _ = tx.send(outcome).await;
                });
            }
            false
        };

        let collect = async {
            while let Some(outcome) = rx.recv().await {
                self.deliver(sink, &outcome).await;
            }
        };

        let (interrupted, ()) = tokio::join!(dispatch, collect);

        let done = self.progress.snapshot();
        record.succeeded = done.succeeded;
        record.failed = done.failed;
        record.persist_failures = done.persist_failures;
        record.interrupted = interrupted;
        record.completed_at = Utc::now();

        if interrupted {
            tracing::warn!(
                run_id = %record.run_id,
                processed = done.processed,
                total = done.total,
                "Scan interrupted, dispatch stopped"
            );
        }
        tracing::info!(
            run_id = %record.run_id,
            processed = done.processed,
            succeeded = done.succeeded,
            failed = done.failed,
            persist_failures = done.persist_failures,
            duration_ms = (record.completed_at - record.started_at).num_milliseconds(),
            "Scan run complete"
        );

        if let Err(e) = sink.record_run(&record).await {
            tracing::error!(run_id = %record.run_id, error = %e, "Failed to record scan run");
        }

        record
    }

    async fn deliver<S: ResultSink + ?Sized>(&self, sink: &S, outcome: &ScanOutcome) {
        if let Err(e) = sink.record(outcome).await {
            self.progress.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(host = %outcome.host, error = %e, "Failed to persist outcome");
        }

        let processed = self.progress.observe(outcome.status);
        let total = self.progress.total.load(Ordering::Relaxed);
        if processed % self.progress_every == 0 || processed == total {
            tracing::info!(processed, total, "Progress");
        }
    }
}

/// Run one probe in its own task so a panic is confined to that host.
async fn probe_isolated<P>(prober: Arc<P>, host: Host) -> ScanOutcome
where
    P: Probe + ?Sized + 'static,
{
    let task_host = host.clone();
    match tokio::spawn(async move { prober.probe(&task_host).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(host = %host, error = %e, "Probe task failed");
            ScanOutcome::failed(host)
        }
    }
}

/// Probe exactly one host, hand the outcome to `report`, then persist it.
///
/// Bypasses dispatch entirely. A persistence failure is returned to the caller.
pub async fn scan_single<P, S, F>(prober: &P, sink: &S, host: Host, report: F) -> Result<ScanOutcome>
where
    P: Probe + ?Sized,
    S: ResultSink + ?Sized,
    F: FnOnce(&ScanOutcome),
{
    let mut record = RunRecord::begin(RunMode::Single, 1);
    tracing::info!(run_id = %record.run_id, host = %host, "Scanning single host");

    let outcome = prober.probe(&host).await;
    report(&outcome);

    match outcome.status {
        ProbeStatus::Success => record.succeeded = 1,
        ProbeStatus::Failed => record.failed = 1,
    }

    let persisted = sink.record(&outcome).await;
    if persisted.is_err() {
        record.persist_failures = 1;
    }
    record.completed_at = Utc::now();
    if let Err(e) = sink.record_run(&record).await {
        tracing::error!(run_id = %record.run_id, error = %e, "Failed to record scan run");
    }

    persisted?;
    Ok(outcome)
}
