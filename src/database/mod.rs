//! Database access, owned by the coordinator.
//!
//! # Data Flow
//! ```text
//! QueryRequest (from a worker)
//!     → executor.rs (bind parameters, run statement)
//!     → rows as JSON | QueryFailure with driver diagnostics
//!     → QueryResponse (to the same worker)
//! ```
//!
//! Workers never link against this module at runtime.

pub mod executor;
pub mod schema;

pub use executor::{bind_value, describe_failure, Executor, SqlExecutor};
