//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure shared by the
//! coordinator and its workers. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// HTTP request limits.
    pub http: HttpConfig,

    /// Database connection owned by the coordinator.
    pub database: DatabaseConfig,

    /// Worker pool settings.
    pub workers: WorkerConfig,

    /// Worker-side query relay settings.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080"), shared by every worker.
    pub bind_address: String,

    /// Accept backlog passed to `listen(2)`.
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 1024,
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: u64,

    /// Deadline for reading a request body, in seconds.
    pub body_read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8_000_000,
            body_read_timeout_secs: 30,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., "sqlite://discard.db?mode=rwc").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Log every statement through sqlx.
    pub sqlx_logging: bool,

    /// Create the resource tables on startup if they are missing.
    pub bootstrap_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://discard.db?mode=rwc".to_string(),
            max_connections: 10,
            sqlx_logging: false,
            bootstrap_schema: true,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker processes. Defaults to the available processing units.
    pub count: Option<usize>,

    /// Base delay before retrying a failed spawn, in milliseconds.
    pub respawn_base_delay_ms: u64,

    /// Upper bound for the spawn retry delay, in milliseconds.
    pub respawn_max_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: None,
            respawn_base_delay_ms: 100,
            respawn_max_delay_ms: 5000,
        }
    }
}

impl WorkerConfig {
    /// Target pool size.
    pub fn resolved_count(&self) -> usize {
        self.count
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Query relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Give up on a coordinator reply after this many seconds. Unset waits forever.
    pub query_timeout_secs: Option<u64>,

    /// Replies kept for listeners that have not registered yet.
    pub max_parked_replies: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: None,
            max_parked_replies: 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
