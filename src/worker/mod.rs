//! Worker process.
//!
//! # Data Flow
//! ```text
//! client ─▶ shared listener ─▶ HttpServer ─▶ Dispatcher ─▶ handler
//!                                                            │ ctx.db()
//!                                                            ▼
//! stdout ◀── spawn_writer ◀── QueryRequest ◀──────────── QueryRelay
//! stdin  ──▶ read_frames ───▶ QueryResponse ─▶ relay.deliver ─┘
//! ```
//!
//! # Design Decisions
//! - The worker holds no database handle; every query crosses the IPC link
//! - EOF on the inbound link means the coordinator is gone: waiting callers
//!   are failed and the worker shuts down
//! - stdin is pumped by a plain OS thread; after a signal-driven shutdown the
//!   process exits without waiting for the coordinator to write again

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::controllers;
use crate::http::{BodyLimits, Dispatcher, HttpServer};
use crate::ipc::{read_frames, spawn_blocking_reader, spawn_writer, QueryRequest, QueryResponse};
use crate::lifecycle::{wait_for_termination, Shutdown};
use crate::net::{bind_shared, ListenerError};
use crate::relay::QueryRelay;
use crate::routing::RouteError;

/// Worker failure.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("route table: {0}")]
    Routes(#[from] RouteError),
    #[error("HTTP server failed: {0}")]
    Server(#[from] std::io::Error),
    #[error("coordinator link unavailable: {0}")]
    Ipc(std::io::Error),
}

/// Entry point of the `worker` subcommand: IPC over stdin/stdout.
pub async fn run_worker(config: AppConfig, slot: u64) -> Result<(), WorkerError> {
    let listener = bind_shared(&config.listener)?;
    tracing::info!(slot, pid = std::process::id(), "Worker starting");

    let shutdown = async {
        match wait_for_termination().await {
            Ok(signal) => tracing::info!(signal, "Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Signal handling unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    let inbound = spawn_blocking_reader(std::io::stdin(), "coordinator").map_err(WorkerError::Ipc)?;

    serve(&config, slot, listener, inbound, tokio::io::stdout(), shutdown)
        .instrument(tracing::info_span!("worker", slot))
        .await
}

/// Serve HTTP on `listener`, relaying queries over `ipc_in`/`ipc_out`,
/// until `shutdown` resolves or the coordinator link closes.
pub async fn serve<R, W, F>(
    config: &AppConfig,
    slot: u64,
    listener: TcpListener,
    ipc_in: R,
    ipc_out: W,
    shutdown: F,
) -> Result<(), WorkerError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let (outbound, writer_task) = spawn_writer::<_, QueryRequest>(ipc_out, "coordinator".to_string());
    let relay = QueryRelay::new(outbound, &config.relay);

    let routes = Arc::new(controllers::routes()?);
    for route in routes.routes() {
        tracing::debug!(pattern = route.pattern(), handler = route.handler().name(), "Route registered");
    }
    let dispatcher = Dispatcher::new(routes, relay.clone(), BodyLimits::from(&config.http));

    let stop = Arc::new(Shutdown::new());

    let inbound = tokio::spawn(
        {
            let relay = relay.clone();
            let stop = Arc::clone(&stop);
            async move {
                let result = read_frames(ipc_in, "coordinator", |response: QueryResponse| {
                    relay.deliver(response);
                })
                .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Coordinator link failed");
                }
                let abandoned = relay.abandon_all();
                tracing::warn!(abandoned, "Coordinator link closed, shutting down");
                stop.trigger();
            }
        }
        .in_current_span(),
    );

    tokio::spawn({
        let stop = Arc::clone(&stop);
        async move {
            shutdown.await;
            stop.trigger();
        }
    });

    let result = HttpServer::new(dispatcher, slot).run(listener, stop.wait()).await;

    inbound.abort();
    writer_task.abort();
    tracing::info!(pending = relay.pending_count(), "Worker stopped");

    result?;
    Ok(())
}
