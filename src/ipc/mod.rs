//! Inter-process channel between the coordinator and its workers.
//!
//! # Data Flow
//! ```text
//! Worker                                   Coordinator
//!   QueryRelay::execute
//!     → QueryRequest  ── stdout line ──▶  read_frames (per worker)
//!                                           → Executor::execute
//!   read_frames (stdin)  ◀── stdin line ──  QueryResponse (same correlationId)
//!     → QueryRelay::deliver
//! ```
//!
//! # Design Decisions
//! - Native process pipes, one JSON document per line
//! - No shared state: everything a worker knows arrives as a message
//! - `kind` is a closed enum; unknown kinds fail to decode and are skipped

pub mod channel;
pub mod envelope;

pub use channel::{read_frames, spawn_blocking_reader, spawn_writer, IpcError};
pub use envelope::{CorrelationId, MessageKind, Payload, QueryFailure, QueryRequest, QueryResponse, Rows};
