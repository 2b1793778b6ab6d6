//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Worker startup
//!     → listener.rs (shared bind, SO_REUSEPORT)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;

pub use listener::{bind_shared, ListenerError};
