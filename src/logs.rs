// Durable log commit.
//
// A committed log is the exact byte stream one child emitted, under a
// name derived only from the device and task kind. Commits stage the
// bytes in a temp file inside the log directory and rename it over the
// final name: the directory never shows a partially written log, and a
// repeat commit (same device twice in one batch) atomically replaces
// the previous file, last writer wins.

use crate::{DeviceId, SweepError, SweepResult, TaskKind};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// `<prefix>-<device>.log`, prefix `shred` for wipe, `badblocks` for scan.
pub fn log_file_name(device: &DeviceId, kind: TaskKind) -> String {
    format!("{}-{}.log", kind.log_prefix(), device)
}

/// Writes per-device logs under one configured directory. The directory
/// must exist and be writable before the first commit; the binary creates
/// it up front.
#[derive(Debug, Clone)]
pub struct LogCommitter {
    log_dir: PathBuf,
}

impl LogCommitter {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Deterministic destination for a device/kind pair.
    pub fn log_path(&self, device: &DeviceId, kind: TaskKind) -> PathBuf {
        self.log_dir.join(log_file_name(device, kind))
    }

    /// Write `bytes` in full to the device's log path. Any filesystem
    /// problem (directory missing, disk full, permissions) comes back as
    /// a commit error naming the exact path that failed to persist.
    pub fn commit(&self, device: &DeviceId, kind: TaskKind, bytes: &[u8]) -> SweepResult<PathBuf> {
        let path = self.log_path(device, kind);
        let commit_err = |source: std::io::Error| SweepError::Commit {
            path: path.clone(),
            source,
        };

        let mut staged = NamedTempFile::new_in(&self.log_dir).map_err(commit_err)?;
        staged.write_all(bytes).map_err(commit_err)?;
        staged.as_file().sync_all().map_err(commit_err)?;
        staged.persist(&path).map_err(|e| commit_err(e.error))?;

        debug!("committed {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
