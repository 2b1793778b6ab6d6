//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator and workers produce:
//!     → logging.rs (structured log events on stderr)
//!
//! Workers inherit the coordinator's stderr, so one terminal (or one log
//! collector) sees the whole process tree.
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID appears on every access log line

pub mod logging;

pub use logging::init_logging;
