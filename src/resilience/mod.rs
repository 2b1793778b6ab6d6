//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Worker spawn fails:
//!     → backoff.rs (exponential delay with jitter)
//!     → supervisor retries the spawn
//! ```

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
