//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, human format for development
//! - Always writes to stderr: a worker's stdout carries the IPC stream

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. `role` tags every line (e.g. `coordinator`, `worker-3`).
pub fn init_logging(config: &ObservabilityConfig, role: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(role, "Logging initialized");
    }
}

fn default_directives(level: &str) -> String {
    format!("discard={level},tower_http={level},sea_orm=warn,sqlx=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_the_crate() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("discard=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        let config = ObservabilityConfig::default();
        init_logging(&config, "test");
        init_logging(&config, "test");
    }
}
