//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Connect database → Bootstrap schema → Spawn workers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop respawning → Close worker links → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then database, then workers
//! - Ordered shutdown: stop respawning first so exits are not replaced

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
pub use startup::{connect_database, StartupError};
