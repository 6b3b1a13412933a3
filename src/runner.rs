// Child process launch and supervision.
//
// Each task gets its own child process and its own scratch file. The
// child's stdout and stderr are two dups of the scratch descriptor, so
// the kernel interleaves them the way `2>&1` would and the child can
// never stall on a full pipe no matter how much progress output it
// emits. The scratch file lives exactly as long as the handle: created
// at start, read back once after exit, deleted when the captured bytes
// are dropped after a successful commit.

use crate::{BatchConfig, SweepError, SweepResult, Task, TaskKind};
use log::{debug, warn};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};

/// Program plus argument vector for one task. Always executed directly,
/// never through a shell, so a device token stays a single argv slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn for_task(task: &Task, config: &BatchConfig) -> Self {
        let program = config.program_for(task.kind).to_path_buf();
        let device = task.device.device_path().into_os_string();
        let args = match task.kind {
            TaskKind::Wipe => vec![
                OsString::from("-n"),
                OsString::from(config.wipe_passes.to_string()),
                OsString::from("-z"),
                OsString::from("-v"),
                device,
            ],
            TaskKind::Scan => vec![OsString::from("-n"), OsString::from("-v"), device],
        };
        Self { program, args }
    }
}

/// Launches external tools per task. Holds its own copy of the batch
/// configuration; nothing here is shared between tasks.
pub struct ProcessRunner {
    config: BatchConfig,
}

impl ProcessRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Spawn the external tool for `task` with its output redirected into
    /// a fresh scratch file. Fails with a launch error when the scratch
    /// file cannot be created or the program cannot be spawned (missing
    /// binary, permission denied).
    pub fn start(&self, task: Task) -> SweepResult<RunHandle> {
        let invocation = ToolInvocation::for_task(&task, &self.config);
        let launch = |source: std::io::Error| SweepError::Launch {
            program: invocation.program.display().to_string(),
            device: task.device.to_string(),
            source,
        };

        let scratch = match &self.config.scratch_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(launch)?;

        // Two dups of one descriptor: shared offset, proper interleaving.
        let stdout = scratch.as_file().try_clone().map_err(launch)?;
        let stderr = scratch.as_file().try_clone().map_err(launch)?;

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(launch)?;

        debug!(
            "started {} {} for {} (pid {:?})",
            invocation.program.display(),
            task.kind,
            task.device,
            child.id()
        );

        Ok(RunHandle {
            task,
            child,
            scratch,
        })
    }
}

/// One running task: the child process and its scratch file. Exclusively
/// owned; consumed by `wait`, never reused.
pub struct RunHandle {
    task: Task,
    child: Child,
    scratch: NamedTempFile,
}

impl RunHandle {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for this child to exit, then read the scratch file back and
    /// hand off the captured bytes. Blocks only on this handle's own
    /// process. The exit status is returned verbatim, zero or not.
    pub async fn wait(mut self) -> SweepResult<(ExitStatus, Captured)> {
        let status = self.child.wait().await?;
        let bytes = tokio::fs::read(self.scratch.path()).await?;

        debug!(
            "{} {} exited with {} ({} bytes captured)",
            self.task.kind,
            self.task.device,
            status,
            bytes.len()
        );

        Ok((
            status,
            Captured {
                bytes,
                scratch: self.scratch,
            },
        ))
    }
}

/// Output captured from one finished child. Dropping this deletes the
/// scratch file; `preserve_scratch` keeps it on disk instead so the
/// operator can recover output whose commit failed.
pub struct Captured {
    bytes: Vec<u8>,
    scratch: NamedTempFile,
}

impl Captured {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Persist the scratch file and return its path. Used when the log
    /// commit fails: the output must not silently disappear.
    pub fn preserve_scratch(self) -> Option<PathBuf> {
        match self.scratch.keep() {
            Ok((_, path)) => Some(path),
            Err(err) => {
                warn!("could not preserve scratch file: {}", err);
                None
            }
        }
    }
}
