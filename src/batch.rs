// Batch orchestration over a set of devices.
//
// The defining decision lives here: every device's process is started
// before any is waited on. Wipe and scan durations are dominated by
// device I/O bandwidth, so N devices run in parallel for close to the
// cost of one. Completion order is unconstrained; results come back in
// the caller-supplied device order.

use crate::logs::LogCommitter;
use crate::runner::{ProcessRunner, RunHandle};
use crate::{BatchConfig, DeviceId, SweepError, Task, TaskKind};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What happened to one device in one batch.
#[derive(Debug)]
pub enum DeviceOutcome {
    /// Tool exited zero and the log was committed.
    Success { status: ExitStatus, log_path: PathBuf },
    /// Tool exited nonzero or was killed by a signal. Its output is still
    /// committed; partial logs of a failed run are diagnostics, not trash.
    RuntimeFailure { status: ExitStatus, log_path: PathBuf },
    /// The process never started (missing binary, permissions, scratch
    /// creation failure).
    LaunchError(SweepError),
    /// The log could not be persisted. `status` is `None` when the wait
    /// itself failed before a status was observed; `scratch_path` points
    /// at the preserved scratch output when it survived.
    CommitError {
        status: Option<ExitStatus>,
        error: SweepError,
        scratch_path: Option<PathBuf>,
    },
}

impl DeviceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeviceOutcome::Success { .. })
    }

    /// Exit status of the underlying tool, verbatim, when one exists.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            DeviceOutcome::Success { status, .. } => Some(*status),
            DeviceOutcome::RuntimeFailure { status, .. } => Some(*status),
            DeviceOutcome::LaunchError(_) => None,
            DeviceOutcome::CommitError { status, .. } => *status,
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        match self {
            DeviceOutcome::Success { log_path, .. } => Some(log_path),
            DeviceOutcome::RuntimeFailure { log_path, .. } => Some(log_path),
            _ => None,
        }
    }
}

/// Result for a single device occurrence in a batch.
#[derive(Debug)]
pub struct DeviceReport {
    pub device: DeviceId,
    pub kind: TaskKind,
    pub outcome: DeviceOutcome,
    pub duration: Duration,
}

/// Result of one whole batch, device reports in caller order.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub kind: TaskKind,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub reports: Vec<DeviceReport>,
}

impl BatchReport {
    pub fn successes(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.reports.len() - self.successes()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// Runs batches. Holds the runner and committer; both are handed their
/// configuration explicitly at construction, nothing ambient.
pub struct BatchOrchestrator {
    runner: ProcessRunner,
    committer: LogCommitter,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        let committer = LogCommitter::new(config.log_dir.clone());
        let runner = ProcessRunner::new(config);
        Self { runner, committer }
    }

    pub fn committer(&self) -> &LogCommitter {
        &self.committer
    }

    /// Run `kind` against every device in `devices`, concurrently.
    ///
    /// Devices are taken exactly as supplied: order preserved, duplicates
    /// not collapsed (each occurrence runs its own process; duplicate
    /// occurrences race to the same log path and the last committed write
    /// wins, a documented caveat of supplying duplicates). An empty set
    /// returns an empty report without starting anything. Per-device
    /// failures never abort the batch, and nothing is retried.
    pub async fn run(&self, devices: &[DeviceId], kind: TaskKind) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let batch_start = Instant::now();

        info!("batch {} starting: {} on {} device(s)", batch_id, kind, devices.len());

        // Phase 1: start every process before waiting on any. A launch
        // failure is recorded for its device and the loop keeps going.
        let mut slots: Vec<Option<DeviceReport>> = Vec::with_capacity(devices.len());
        let mut started: Vec<(usize, RunHandle, Instant)> = Vec::new();

        for (index, device) in devices.iter().enumerate() {
            let begun = Instant::now();
            match self.runner.start(Task::new(device.clone(), kind)) {
                Ok(handle) => {
                    started.push((index, handle, begun));
                    slots.push(None);
                }
                Err(err) => {
                    warn!("launch failed for {}: {}", device, err);
                    slots.push(Some(DeviceReport {
                        device: device.clone(),
                        kind,
                        outcome: DeviceOutcome::LaunchError(err),
                        duration: begun.elapsed(),
                    }));
                }
            }
        }

        // Phase 2: supervise all started handles as one concurrent set and
        // join it whole. Waiting on one device never delays another; each
        // handle owns its child and scratch exclusively.
        let width = started.len().max(1);
        let finished = stream::iter(started)
            .map(|(index, handle, begun)| {
                let committer = self.committer.clone();
                async move { (index, supervise(handle, committer, begun).await) }
            })
            .buffer_unordered(width)
            .collect::<Vec<_>>()
            .await;

        for (index, report) in finished {
            slots[index] = Some(report);
        }

        // Every slot is filled now: launch failures in phase 1, the rest
        // in phase 2.
        let reports: Vec<DeviceReport> = slots.into_iter().flatten().collect();

        let report = BatchReport {
            batch_id,
            kind,
            started_at,
            duration: batch_start.elapsed(),
            reports,
        };

        info!(
            "batch {} finished: {} succeeded, {} failed",
            batch_id,
            report.successes(),
            report.failures()
        );

        report
    }

    /// Wipe every device, then scan every device. The scan batch does not
    /// begin until the wipe batch has completed in full, commits included;
    /// scanning a device mid-wipe would verify garbage.
    pub async fn run_wipe_then_scan(&self, devices: &[DeviceId]) -> (BatchReport, BatchReport) {
        let wipe = self.run(devices, TaskKind::Wipe).await;
        let scan = self.run(devices, TaskKind::Scan).await;
        (wipe, scan)
    }
}

/// Wait for one handle and drive the commit for its output.
async fn supervise(handle: RunHandle, committer: LogCommitter, begun: Instant) -> DeviceReport {
    let task = handle.task().clone();

    let outcome = match handle.wait().await {
        Ok((status, captured)) => {
            match committer.commit(&task.device, task.kind, captured.bytes()) {
                Ok(log_path) => {
                    if status.success() {
                        DeviceOutcome::Success { status, log_path }
                    } else {
                        warn!("{} on {} exited with {}", task.kind, task.device, status);
                        DeviceOutcome::RuntimeFailure { status, log_path }
                    }
                }
                Err(error) => {
                    warn!("commit failed for {} on {}: {}", task.kind, task.device, error);
                    let scratch_path = captured.preserve_scratch();
                    DeviceOutcome::CommitError {
                        status: Some(status),
                        error,
                        scratch_path,
                    }
                }
            }
        }
        Err(error) => {
            warn!("wait failed for {} on {}: {}", task.kind, task.device, error);
            DeviceOutcome::CommitError {
                status: None,
                error,
                scratch_path: None,
            }
        }
    };

    DeviceReport {
        device: task.device,
        kind: task.kind,
        outcome,
        duration: begun.elapsed(),
    }
}

#[cfg(test)]
mod batch_tests;
