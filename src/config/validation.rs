//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::new("http.max_body_bytes", "must be greater than 0"));
    }
    if config.http.body_read_timeout_secs == 0 {
        errors.push(ValidationError::new("http.body_read_timeout_secs", "must be greater than 0"));
    }

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::new("database.url", "must not be empty"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be at least 1"));
    }

    if config.workers.count == Some(0) {
        errors.push(ValidationError::new("workers.count", "must be at least 1"));
    }
    if config.workers.respawn_base_delay_ms > config.workers.respawn_max_delay_ms {
        errors.push(ValidationError::new(
            "workers.respawn_base_delay_ms",
            "must not exceed workers.respawn_max_delay_ms",
        ));
    }

    if config.relay.query_timeout_secs == Some(0) {
        errors.push(ValidationError::new("relay.query_timeout_secs", "must be greater than 0 when set"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
