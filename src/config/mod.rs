//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), path passed with --config
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → coordinator reads database/workers, workers read listener/http/relay
//!
//! Workers receive the same --config path as the coordinator, so every
//! process in the tree sees the same file.
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use schema::{
    AppConfig, DatabaseConfig, HttpConfig, ListenerConfig, ObservabilityConfig, RelayConfig, WorkerConfig,
};
pub use validation::ValidationError;
