//! Shared utilities for coordinator and end-to-end tests.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;

use discard::config::{AppConfig, DatabaseConfig, WorkerConfig};
use discard::coordinator::{Coordinator, CoordinatorError, ExitReport, LaunchError, Launcher, WorkerId, WorkerLink, WorkerRegistry};
use discard::database::{Executor, SqlExecutor};
use discard::ipc::{read_frames, spawn_writer, QueryFailure, QueryRequest, QueryResponse, Rows};
use discard::lifecycle::connect_database;
use discard::net::bind_shared;

pub const WAIT: Duration = Duration::from_secs(2);

/// Worker settings with short respawn delays.
pub fn worker_config(count: usize) -> WorkerConfig {
    WorkerConfig {
        count: Some(count),
        respawn_base_delay_ms: 5,
        respawn_max_delay_ms: 20,
    }
}

/// The worker end of an in-memory IPC link.
pub struct FakeWorker {
    pub id: WorkerId,
    outbound: mpsc::UnboundedSender<QueryRequest>,
    inbound: mpsc::UnboundedReceiver<QueryResponse>,
    kill: Option<oneshot::Sender<ExitReport>>,
}

impl FakeWorker {
    pub fn send(&self, request: QueryRequest) {
        self.outbound.send(request).unwrap();
    }

    /// Next reply, or `None` if nothing arrives within `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<QueryResponse> {
        tokio::time::timeout(wait, self.inbound.recv()).await.ok().flatten()
    }

    pub async fn recv(&mut self) -> QueryResponse {
        self.recv_within(WAIT).await.expect("no reply from coordinator")
    }

    /// Whether the coordinator closed this worker's inbound stream.
    pub async fn closed_within(&mut self, wait: Duration) -> bool {
        matches!(tokio::time::timeout(wait, self.inbound.recv()).await, Ok(None))
    }

    /// Simulate the process dying.
    pub fn kill(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(ExitReport {
                code: None,
                reason: "killed by test".into(),
            });
        }
    }
}

/// Launcher that wires each worker to an in-memory duplex stream.
pub struct MemoryLauncher {
    launched: mpsc::UnboundedSender<FakeWorker>,
    failures_left: Arc<AtomicU32>,
}

impl MemoryLauncher {
    pub fn new(failures_left: Arc<AtomicU32>) -> (Self, mpsc::UnboundedReceiver<FakeWorker>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                launched: tx,
                failures_left,
            },
            rx,
        )
    }
}

impl Launcher for MemoryLauncher {
    fn launch(&self, id: WorkerId) -> Result<WorkerLink, LaunchError> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(LaunchError::Spawn(std::io::Error::other("injected launch failure")));
        }

        let (coordinator_end, worker_end) = tokio::io::duplex(64 * 1024);
        let (coordinator_read, coordinator_write) = tokio::io::split(coordinator_end);
        let (worker_read, worker_write) = tokio::io::split(worker_end);

        let (outbound, _writer) = spawn_writer::<_, QueryRequest>(worker_write, format!("fake-{id}"));
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let _ = read_frames(worker_read, "coordinator", |response: QueryResponse| {
                let _ = replies_tx.send(response);
            })
            .await;
        });

        let (kill_tx, kill_rx) = oneshot::channel();
        let exited: BoxFuture<'static, ExitReport> = Box::pin(async move {
            kill_rx.await.unwrap_or(ExitReport {
                code: None,
                reason: "handle dropped".into(),
            })
        });

        let _ = self.launched.send(FakeWorker {
            id,
            outbound,
            inbound: replies_rx,
            kill: Some(kill_tx),
        });

        Ok(WorkerLink {
            pid: None,
            reader: Box::new(coordinator_read),
            writer: Box::new(coordinator_write),
            exited,
        })
    }
}

/// Executor that echoes statements back, fails `FAIL ...` statements with
/// fixed diagnostics, and holds `SLOW ...` statements until released.
pub struct ScriptedExecutor {
    pub calls: Mutex<Vec<String>>,
    gate: Semaphore,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        })
    }

    /// Let `n` held statements finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn failure() -> QueryFailure {
        QueryFailure {
            message: "duplicate key value violates unique constraint".into(),
            code: Some("23505".into()),
            constraint: Some("users_username_key".into()),
            table: Some("users".into()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(&'a self, statement: &'a str, parameters: &'a [Value]) -> BoxFuture<'a, Result<Rows, QueryFailure>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(statement.to_string());
            if statement.starts_with("SLOW") {
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
            }
            if statement.starts_with("FAIL") {
                return Err(Self::failure());
            }
            Ok(vec![json!({ "statement": statement, "parameters": parameters })])
        })
    }
}

/// A coordinator running in the background.
pub struct CoordinatorHarness {
    pub registry: Arc<WorkerRegistry>,
    pub launched: mpsc::UnboundedReceiver<FakeWorker>,
    failures_left: Arc<AtomicU32>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), CoordinatorError>>,
}

impl CoordinatorHarness {
    pub fn start(count: usize, executor: Arc<dyn Executor>, fail_first: u32) -> Self {
        let failures_left = Arc::new(AtomicU32::new(fail_first));
        let (launcher, launched) = MemoryLauncher::new(Arc::clone(&failures_left));
        let coordinator = Coordinator::new(Arc::new(launcher), executor, worker_config(count));
        let registry = coordinator.registry();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(coordinator.run(async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            registry,
            launched,
            failures_left,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Make the next `n` launches fail.
    pub fn fail_next_launches(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub async fn next_worker(&mut self) -> FakeWorker {
        self.next_worker_within(WAIT).await.expect("no worker launched")
    }

    pub async fn next_worker_within(&mut self, wait: Duration) -> Option<FakeWorker> {
        tokio::time::timeout(wait, self.launched.recv()).await.ok().flatten()
    }

    pub async fn workers(&mut self, n: usize) -> Vec<FakeWorker> {
        let mut workers = Vec::with_capacity(n);
        for _ in 0..n {
            workers.push(self.next_worker().await);
        }
        workers
    }

    /// Poll until the registry reports `n` running workers.
    pub async fn wait_for_running(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.registry.running() != n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {n} running workers, have {}",
                self.registry.running()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn stop(mut self) -> Result<(), CoordinatorError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap()
    }
}

/// An in-memory SQLite executor with the resource schema.
pub async fn sqlite_executor() -> Arc<SqlExecutor> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        sqlx_logging: false,
        bootstrap_schema: true,
    };
    Arc::new(SqlExecutor::new(connect_database(&config).await.unwrap()))
}

/// Launcher that runs real workers as tasks in this process, serving HTTP on
/// one shared loopback port and talking to the coordinator over duplex streams.
pub struct InProcessLauncher {
    config: AppConfig,
    addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl InProcessLauncher {
    pub fn new() -> (Self, Arc<Mutex<Option<SocketAddr>>>) {
        let mut config = AppConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        let addr = Arc::new(Mutex::new(None));
        (
            Self {
                config,
                addr: Arc::clone(&addr),
            },
            addr,
        )
    }
}

impl Launcher for InProcessLauncher {
    fn launch(&self, id: WorkerId) -> Result<WorkerLink, LaunchError> {
        let mut config = self.config.clone();
        if let Some(addr) = *self.addr.lock().unwrap() {
            config.listener.bind_address = addr.to_string();
        }

        let listener = bind_shared(&config.listener)
            .map_err(|e| LaunchError::Spawn(std::io::Error::other(e.to_string())))?;
        let local = listener.local_addr().map_err(LaunchError::Spawn)?;
        self.addr.lock().unwrap().get_or_insert(local);

        let (coordinator_end, worker_end) = tokio::io::duplex(64 * 1024);
        let (coordinator_read, coordinator_write) = tokio::io::split(coordinator_end);
        let (worker_read, worker_write) = tokio::io::split(worker_end);

        let slot = id.as_u64();
        let handle = tokio::spawn(async move {
            discard::worker::serve(
                &config,
                slot,
                listener,
                worker_read,
                worker_write,
                std::future::pending::<()>(),
            )
            .await
        });

        Ok(WorkerLink {
            pid: None,
            reader: Box::new(coordinator_read),
            writer: Box::new(coordinator_write),
            exited: Box::pin(async move {
                match handle.await {
                    Ok(Ok(())) => ExitReport {
                        code: Some(0),
                        reason: "stopped".into(),
                    },
                    Ok(Err(e)) => ExitReport {
                        code: Some(1),
                        reason: e.to_string(),
                    },
                    Err(e) => ExitReport {
                        code: None,
                        reason: e.to_string(),
                    },
                }
            }),
        })
    }
}

/// Wait until the in-process workers have published their address.
pub async fn wait_for_addr(addr: &Arc<Mutex<Option<SocketAddr>>>) -> SocketAddr {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(addr) = *addr.lock().unwrap() {
            return addr;
        }
        assert!(tokio::time::Instant::now() < deadline, "workers never bound");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
