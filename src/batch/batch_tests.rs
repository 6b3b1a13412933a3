// Unit tests for batch aggregation and the launch-failure path. The
// full end-to-end scenarios against stub tools live in tests/batch_run.rs.

use super::*;
use std::os::unix::process::ExitStatusExt;
use tempfile::TempDir;

fn device(name: &str) -> DeviceId {
    DeviceId::parse(name).unwrap()
}

fn exit_status(code: i32) -> ExitStatus {
    // wait(2) encoding: exit code lives in bits 8..16.
    ExitStatus::from_raw(code << 8)
}

fn config_with_log_dir(dir: &TempDir) -> BatchConfig {
    BatchConfig {
        log_dir: dir.path().to_path_buf(),
        ..BatchConfig::default()
    }
}

// ==================== OUTCOME AND REPORT HELPERS ====================

#[test]
fn test_outcome_success_exposes_status_and_log() {
    let outcome = DeviceOutcome::Success {
        status: exit_status(0),
        log_path: PathBuf::from("/var/log/sweep/shred-sda.log"),
    };

    assert!(outcome.is_success());
    assert!(outcome.exit_status().unwrap().success());
    assert_eq!(
        outcome.log_path(),
        Some(Path::new("/var/log/sweep/shred-sda.log"))
    );
}

#[test]
fn test_outcome_runtime_failure_surfaces_exit_code_verbatim() {
    let outcome = DeviceOutcome::RuntimeFailure {
        status: exit_status(3),
        log_path: PathBuf::from("badblocks-sdx.log"),
    };

    assert!(!outcome.is_success());
    assert_eq!(outcome.exit_status().unwrap().code(), Some(3));
    // The log is still there: failed runs are committed too.
    assert!(outcome.log_path().is_some());
}

#[test]
fn test_outcome_launch_error_has_no_status_or_log() {
    let outcome = DeviceOutcome::LaunchError(SweepError::Launch {
        program: "shred".to_string(),
        device: "sda".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
    });

    assert!(!outcome.is_success());
    assert!(outcome.exit_status().is_none());
    assert!(outcome.log_path().is_none());
}

#[test]
fn test_batch_report_counts_successes_and_failures() {
    let report = BatchReport {
        batch_id: Uuid::new_v4(),
        kind: TaskKind::Wipe,
        started_at: Utc::now(),
        duration: Duration::from_secs(1),
        reports: vec![
            DeviceReport {
                device: device("sda"),
                kind: TaskKind::Wipe,
                outcome: DeviceOutcome::Success {
                    status: exit_status(0),
                    log_path: PathBuf::from("shred-sda.log"),
                },
                duration: Duration::from_secs(1),
            },
            DeviceReport {
                device: device("sdb"),
                kind: TaskKind::Wipe,
                outcome: DeviceOutcome::RuntimeFailure {
                    status: exit_status(1),
                    log_path: PathBuf::from("shred-sdb.log"),
                },
                duration: Duration::from_secs(1),
            },
        ],
    };

    assert_eq!(report.successes(), 1);
    assert_eq!(report.failures(), 1);
    assert!(!report.all_succeeded());
}

// ==================== EMPTY AND ALL-FAILED BATCHES ====================

#[tokio::test]
async fn test_empty_device_set_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let orchestrator = BatchOrchestrator::new(config_with_log_dir(&dir));

    let report = orchestrator.run(&[], TaskKind::Wipe).await;

    assert!(report.reports.is_empty());
    assert!(report.all_succeeded());
    // No process ran, so nothing was committed.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_binary_fails_every_device_without_aborting_the_batch() {
    let dir = TempDir::new().unwrap();
    let config = BatchConfig {
        wipe_program: PathBuf::from("/nonexistent/no-such-tool"),
        ..config_with_log_dir(&dir)
    };
    let orchestrator = BatchOrchestrator::new(config);

    let devices = vec![device("sda"), device("sdb"), device("sdc")];
    let report = orchestrator.run(&devices, TaskKind::Wipe).await;

    // One report per device, caller order, none dropped by the failures.
    assert_eq!(report.reports.len(), 3);
    for (given, got) in devices.iter().zip(&report.reports) {
        assert_eq!(&got.device, given);
        assert!(matches!(got.outcome, DeviceOutcome::LaunchError(_)));
    }
    assert_eq!(report.failures(), 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_composite_on_empty_set_returns_two_empty_reports() {
    let dir = TempDir::new().unwrap();
    let orchestrator = BatchOrchestrator::new(config_with_log_dir(&dir));

    let (wipe, scan) = orchestrator.run_wipe_then_scan(&[]).await;

    assert!(wipe.reports.is_empty());
    assert!(scan.reports.is_empty());
    assert_eq!(wipe.kind, TaskKind::Wipe);
    assert_eq!(scan.kind, TaskKind::Scan);
}
