//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up tracing middleware
//! - Serve on a pre-bound listener until shutdown is signalled
//!
//! Routing happens inside [`Dispatcher`], not in Axum: templates, method
//! gating and body limits all follow this crate's own rules.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::dispatcher::Dispatcher;

/// HTTP front end of a worker.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// `worker` tags every request span so interleaved logs stay attributable.
    pub fn new(dispatcher: Dispatcher, worker: u64) -> Self {
        Self {
            router: Self::build_router(dispatcher, worker),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Dispatcher, worker: u64) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(dispatcher)
            .layer(
                TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        worker,
                        method = %request.method(),
                        uri = %request.uri()
                    )
                }),
            )
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch_handler(
    State(dispatcher): State<Dispatcher>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    dispatcher.dispatch(request, remote_addr).await
}
