//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the coordinator's database pool
//! - Bootstrap the resource schema when configured
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Only the coordinator calls into this module; workers never open the
//!   database

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::database::schema;

/// Error raised while bringing the coordinator up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Connect(#[source] DbErr),
    #[error("schema bootstrap failed: {0}")]
    Schema(#[source] DbErr),
}

/// Connect to the configured database and, if enabled, create missing tables.
pub async fn connect_database(config: &DatabaseConfig) -> Result<DatabaseConnection, StartupError> {
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opt).await.map_err(StartupError::Connect)?;
    tracing::info!(
        max_connections = config.max_connections,
        backend = ?db.get_database_backend(),
        "Database connected"
    );

    if config.bootstrap_schema {
        schema::bootstrap(&db).await.map_err(StartupError::Schema)?;
    }

    Ok(db)
}
