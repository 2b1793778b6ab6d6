//! Coordinator process.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → lifecycle::connect_database (the only pool in the process tree)
//!     → SqlExecutor
//!     → Coordinator::run
//!         → launcher.rs (re-exec self as `worker --slot N`)
//!         → registry.rs (pid + liveness per worker)
//!         → supervisor.rs (execute requests, replace exited workers)
//! ```
//!
//! The coordinator does no routing and no HTTP handling.

pub mod launcher;
pub mod registry;
pub mod supervisor;

pub use launcher::{ExitReport, LaunchError, Launcher, ProcessLauncher, WorkerLink};
pub use registry::{WorkerEntry, WorkerId, WorkerRegistry, WorkerState};
pub use supervisor::{Coordinator, CoordinatorError};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::SqlExecutor;
use crate::lifecycle::{connect_database, wait_for_termination};

/// Run the coordinator until SIGINT/SIGTERM.
pub async fn run_coordinator(config: AppConfig, config_path: Option<PathBuf>) -> Result<(), CoordinatorError> {
    let db = connect_database(&config.database).await?;
    let executor = Arc::new(SqlExecutor::new(db));
    let launcher = Arc::new(ProcessLauncher::current(config_path)?);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = config.workers.resolved_count(),
        "Coordinator starting"
    );

    let shutdown = async {
        match wait_for_termination().await {
            Ok(signal) => tracing::info!(signal, "Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Signal handling failed, shutting down"),
        }
    };

    Coordinator::new(launcher, executor, config.workers.clone())
        .run(shutdown)
        .await?;

    tracing::info!("Coordinator stopped");
    Ok(())
}
