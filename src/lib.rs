pub mod batch;
pub mod device;
pub mod inventory;
pub mod logs;
pub mod runner;

// Re-export the main entry points for convenience
pub use batch::{BatchOrchestrator, BatchReport, DeviceOutcome, DeviceReport};
pub use device::DeviceId;
pub use inventory::{BlockDevice, DeviceInventory};
pub use logs::LogCommitter;
pub use runner::{Captured, ProcessRunner, RunHandle};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid device identifier {token:?}: {reason}")]
    InvalidDevice { token: String, reason: &'static str },

    #[error("failed to launch {program} for {device}: {source}")]
    Launch {
        program: String,
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to commit log {path}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device inventory query failed: {0}")]
    Inventory(String),
}

pub type SweepResult<T> = Result<T, SweepError>;

/// The two batch actions: destructive overwrite and read verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Wipe,
    Scan,
}

impl TaskKind {
    /// Prefix of the committed log file, `<prefix>-<device>.log`.
    pub fn log_prefix(&self) -> &'static str {
        match self {
            TaskKind::Wipe => "shred",
            TaskKind::Scan => "badblocks",
        }
    }

    /// Wipe overwrites the device and cannot be undone. Scan only reads
    /// (badblocks non-destructive mode restores every block it touches).
    pub fn is_destructive(&self) -> bool {
        matches!(self, TaskKind::Wipe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Wipe => "wipe",
            TaskKind::Scan => "scan",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of work: a single device paired with the action to run on it.
/// Immutable once built; the orchestrator creates one per device occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub device: device::DeviceId,
    pub kind: TaskKind,
}

impl Task {
    pub fn new(device: device::DeviceId, kind: TaskKind) -> Self {
        Self { device, kind }
    }
}

/// Batch-wide configuration. Passed explicitly into the orchestrator and
/// committer constructors; there is no ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory that receives the committed per-device log files.
    pub log_dir: PathBuf,
    /// Overwrite passes handed to the wipe tool (`-n <passes>`).
    pub wipe_passes: u32,
    /// Program invoked for wipe tasks.
    pub wipe_program: PathBuf,
    /// Program invoked for scan tasks.
    pub scan_program: PathBuf,
    /// Where scratch buffers are created. `None` means the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log-files"),
            wipe_passes: 10,
            wipe_program: PathBuf::from("shred"),
            scan_program: PathBuf::from("badblocks"),
            scratch_dir: None,
        }
    }
}

impl BatchConfig {
    /// Program responsible for the given task kind.
    pub fn program_for(&self, kind: TaskKind) -> &std::path::Path {
        match kind {
            TaskKind::Wipe => &self.wipe_program,
            TaskKind::Scan => &self.scan_program,
        }
    }
}
