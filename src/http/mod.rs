//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (shared listening port)
//!     → server.rs (Axum setup, catch-all route)
//!     → dispatcher.rs (route lookup, method gate, body read)
//!     → handler.rs (per-verb operation)
//!     → context.rs (params, body, db relay, single response write)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod server;

pub use context::{Outcome, QueryParams, Reply, RequestBody, RequestContext};
pub use dispatcher::{BodyLimits, Dispatcher};
pub use error::{DispatchError, HandlerError, PayloadError};
pub use handler::{Handler, HandlerResult, Operation};
pub use server::HttpServer;
