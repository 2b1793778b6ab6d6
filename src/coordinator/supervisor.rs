//! Worker supervision and query execution.
//!
//! # Responsibilities
//! - Start the configured number of workers
//! - Replace each exited worker with exactly one new one
//! - Execute every `sql` request a worker sends and reply to that worker only
//!
//! # Data Flow
//! ```text
//! worker stdout ─▶ read_frames ─▶ spawn(execute) ─▶ Executor
//!                                                     │
//! worker stdin  ◀─ spawn_writer ◀── QueryResponse ◀───┘
//!
//! exit future resolves ─▶ exits channel ─▶ supervision loop ─▶ launch replacement
//! ```
//!
//! # Design Decisions
//! - Each worker has its own reply queue; when it exits the queue is torn
//!   down and replies still in flight for it are dropped
//! - Statements run concurrently; the pool's own limits apply
//! - A failed initial launch is fatal; a failed replacement launch is
//!   retried with backoff
//! - Workers that die shortly after starting are replaced after a growing
//!   delay so a crash-on-boot cannot spin

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::WorkerConfig;
use crate::coordinator::launcher::{ExitReport, LaunchError, Launcher, WorkerLink};
use crate::coordinator::registry::{WorkerId, WorkerRegistry};
use crate::database::Executor;
use crate::ipc::{read_frames, spawn_writer, QueryRequest, QueryResponse};
use crate::lifecycle::StartupError;
use crate::resilience::Backoff;

/// A worker that exits sooner than this after starting counts as a rapid exit.
const MIN_HEALTHY_UPTIME: Duration = Duration::from_secs(1);

/// Coordinator failure.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

type ExitSender = mpsc::UnboundedSender<(WorkerId, ExitReport)>;

/// Owns the executor and keeps the worker pool at its target size.
pub struct Coordinator {
    launcher: Arc<dyn Launcher>,
    executor: Arc<dyn Executor>,
    registry: Arc<WorkerRegistry>,
    settings: WorkerConfig,
}

impl Coordinator {
    pub fn new(launcher: Arc<dyn Launcher>, executor: Arc<dyn Executor>, settings: WorkerConfig) -> Self {
        Self {
            launcher,
            executor,
            registry: Arc::new(WorkerRegistry::new()),
            settings,
        }
    }

    /// Shared view of the worker registry.
    pub fn registry(&self) -> Arc<WorkerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Supervise workers until `shutdown` resolves, then stop them.
    pub async fn run<F>(self, shutdown: F) -> Result<(), CoordinatorError>
    where
        F: Future<Output = ()> + Send,
    {
        let target = self.settings.resolved_count();
        let (exits_tx, mut exits_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for _ in 0..target {
            let id = WorkerId::new();
            let link = self.launcher.launch(id)?;
            self.attach(&mut workers, &exits_tx, id, link);
        }
        tracing::info!(workers = target, "Worker pool started");

        let mut rapid_exits = Backoff::new(
            self.settings.respawn_base_delay_ms,
            self.settings.respawn_max_delay_ms,
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some((id, report)) = exits_rx.recv() => {
                    self.registry.mark_exited(id);
                    let uptime = self
                        .registry
                        .remove(id)
                        .map(|entry| entry.started_at.elapsed())
                        .unwrap_or_default();

                    tracing::warn!(
                        worker = %id,
                        code = ?report.code,
                        reason = %report.reason,
                        uptime_ms = uptime.as_millis() as u64,
                        "Worker exited, spawning replacement"
                    );

                    let delay = if uptime < MIN_HEALTHY_UPTIME {
                        rapid_exits.next_delay()
                    } else {
                        rapid_exits.reset();
                        Duration::ZERO
                    };

                    let replacement = tokio::select! {
                        _ = &mut shutdown => break,
                        replacement = self.launch_with_backoff(delay) => replacement,
                    };
                    let (id, link) = replacement;
                    self.attach(&mut workers, &exits_tx, id, link);
                }
                Some(joined) = workers.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Worker task panicked");
                        }
                    }
                }
            }
        }

        tracing::info!(workers = self.registry.len(), "Stopping workers");
        workers.shutdown().await;
        Ok(())
    }

    /// Launch one worker, retrying with backoff until it starts.
    async fn launch_with_backoff(&self, initial_delay: Duration) -> (WorkerId, WorkerLink) {
        if !initial_delay.is_zero() {
            tracing::info!(delay_ms = initial_delay.as_millis() as u64, "Delaying replacement after rapid exit");
            tokio::time::sleep(initial_delay).await;
        }

        let mut backoff = Backoff::new(
            self.settings.respawn_base_delay_ms,
            self.settings.respawn_max_delay_ms,
        );
        loop {
            let id = WorkerId::new();
            match self.launcher.launch(id) {
                Ok(link) => return (id, link),
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Worker launch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn attach(&self, workers: &mut JoinSet<()>, exits: &ExitSender, id: WorkerId, link: WorkerLink) {
        self.registry.register(id, link.pid);
        tracing::info!(worker = %id, pid = ?link.pid, "Worker started");

        workers.spawn(serve_worker(id, link, Arc::clone(&self.executor), exits.clone()));
    }
}

/// Serve one worker's requests until it exits, then report the exit.
async fn serve_worker(id: WorkerId, link: WorkerLink, executor: Arc<dyn Executor>, exits: ExitSender) {
    let WorkerLink {
        reader,
        writer,
        mut exited,
        ..
    } = link;
    let peer = id.to_string();
    let (replies, writer_task) = spawn_writer::<_, QueryResponse>(writer, peer.clone());

    let requests = read_frames(reader, &peer, |request: QueryRequest| {
        tokio::spawn(execute_request(id, request, Arc::clone(&executor), replies.clone()));
    });

    let report = tokio::select! {
        report = &mut exited => report,
        result = requests => {
            match result {
                Ok(frames) => tracing::debug!(worker = %id, frames, "Worker closed its output"),
                Err(e) => tracing::warn!(worker = %id, error = %e, "Worker output failed"),
            }
            exited.await
        }
    };

    drop(replies);
    writer_task.abort();
    let _ = exits.send((id, report));
}

async fn execute_request(
    worker: WorkerId,
    request: QueryRequest,
    executor: Arc<dyn Executor>,
    replies: mpsc::UnboundedSender<QueryResponse>,
) {
    let started = Instant::now();
    let correlation_id = request.correlation_id;
    let outcome = executor.execute(&request.statement, &request.parameters).await;

    match &outcome {
        Ok(rows) => tracing::trace!(
            worker = %worker,
            correlation_id,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statement executed"
        ),
        Err(failure) => tracing::debug!(
            worker = %worker,
            correlation_id,
            error = %failure.message,
            code = ?failure.code,
            "Statement failed"
        ),
    }

    if replies
        .send(QueryResponse::for_outcome(correlation_id, outcome))
        .is_err()
    {
        tracing::debug!(worker = %worker, correlation_id, "Worker gone, dropping reply");
    }
}
