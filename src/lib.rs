//! Discard API server library.
//!
//! One coordinator process owns the database; worker processes serve HTTP
//! and reach the database only through correlated IPC messages.

// Shared plumbing
pub mod config;
pub mod ipc;
pub mod net;
pub mod routing;

// Worker side
pub mod controllers;
pub mod http;
pub mod relay;
pub mod worker;

// Coordinator side
pub mod coordinator;
pub mod database;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use coordinator::Coordinator;
pub use http::{Handler, HttpServer, Reply, RequestContext};
pub use relay::{QueryError, QueryRelay};
pub use routing::RouteTable;
