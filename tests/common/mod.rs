/// Common test utilities for the integration tests.
///
/// The real wipe and scan tools destroy data, so the tests drive the
/// orchestrator with small shell scripts that imitate their observable
/// behavior: write some output, maybe sleep, exit with a chosen code.
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use drivesweep::{BatchConfig, DeviceId};

/// Disposable workspace holding stub tools and a log directory.
pub struct StubEnv {
    dir: TempDir,
}

impl StubEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create test workspace"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Write an executable shell script named `name` and return its path.
    /// The device path arrives as the last argument, mirroring the real
    /// tool invocations.
    pub fn stub(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let script = format!("#!/bin/sh\n{}\n", body);
        fs::write(&path, script).expect("Failed to write stub tool");

        let mut perms = fs::metadata(&path)
            .expect("Failed to stat stub tool")
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("Failed to mark stub tool executable");

        path
    }

    /// Build a config pointing the wipe and scan slots at the given stubs.
    /// Also creates the log directory, as the CLI does before a run.
    pub fn config(&self, wipe_tool: &Path, scan_tool: &Path) -> BatchConfig {
        let log_dir = self.log_dir();
        fs::create_dir_all(&log_dir).expect("Failed to create log directory");

        BatchConfig {
            log_dir,
            wipe_program: wipe_tool.to_path_buf(),
            scan_program: scan_tool.to_path_buf(),
            ..BatchConfig::default()
        }
    }
}

pub fn devices(names: &[&str]) -> Vec<DeviceId> {
    names
        .iter()
        .map(|name| DeviceId::parse(name).expect("Failed to parse device name"))
        .collect()
}

/// Read a committed log and return its exact bytes as a string.
pub fn read_log(log_dir: &Path, file_name: &str) -> String {
    let path = log_dir.join(file_name);
    let bytes = fs::read(&path)
        .unwrap_or_else(|err| panic!("Failed to read {}: {}", path.display(), err));
    String::from_utf8(bytes).expect("Log was not UTF-8 in this test")
}
