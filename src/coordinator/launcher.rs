//! Worker process launching.
//!
//! # Responsibilities
//! - Start a worker and hand back its IPC streams and an exit future
//!
//! # Design Decisions
//! - The coordinator re-executes its own binary with the `worker`
//!   subcommand, so both roles always ship together
//! - The child is owned by the exit future with `kill_on_drop`: dropping
//!   the future (coordinator shutdown) kills the worker
//! - stderr is inherited; stdout is reserved for IPC frames

use futures_util::future::BoxFuture;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;

use crate::coordinator::registry::WorkerId;

/// Failure to start a worker.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot locate worker executable: {0}")]
    Executable(#[source] std::io::Error),
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker has no {0} pipe")]
    MissingPipe(&'static str),
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub reason: String,
}

/// A running worker as seen by the coordinator.
pub struct WorkerLink {
    pub pid: Option<u32>,
    /// Worker → coordinator frames.
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Coordinator → worker frames.
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Resolves when the worker is gone.
    pub exited: BoxFuture<'static, ExitReport>,
}

impl std::fmt::Debug for WorkerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLink").field("pid", &self.pid).finish_non_exhaustive()
    }
}

/// Starts workers.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, id: WorkerId) -> Result<WorkerLink, LaunchError>;
}

/// Launches workers as child processes of the current executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self { program, config_path }
    }

    /// Launcher for the running executable.
    pub fn current(config_path: Option<PathBuf>) -> Result<Self, LaunchError> {
        let program = std::env::current_exe().map_err(LaunchError::Executable)?;
        Ok(Self::new(program, config_path))
    }

    fn command(&self, id: WorkerId) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        command
            .arg("worker")
            .arg("--slot")
            .arg(id.as_u64().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, id: WorkerId) -> Result<WorkerLink, LaunchError> {
        let mut child = self.command(id).spawn().map_err(LaunchError::Spawn)?;

        let stdin = child.stdin.take().ok_or(LaunchError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;
        let pid = child.id();

        let exited = Box::pin(async move {
            match child.wait().await {
                Ok(status) => ExitReport {
                    code: status.code(),
                    reason: status.to_string(),
                },
                Err(e) => ExitReport {
                    code: None,
                    reason: format!("wait failed: {e}"),
                },
            }
        });

        Ok(WorkerLink {
            pid,
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            exited,
        })
    }
}
