//! Bootstrap schema for the bundled resources.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username VARCHAR(32) NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "guilds",
        "CREATE TABLE IF NOT EXISTS guilds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR(32) NOT NULL,
            icon VARCHAR(34),
            owner INTEGER NOT NULL REFERENCES users (id),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
];

/// Create any missing resource tables.
pub async fn bootstrap(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (table, ddl) in TABLES {
        db.execute_unprepared(ddl).await?;
        tracing::debug!(table, "Table ready");
    }
    Ok(())
}

/// Whether `table` exists in the connected SQLite database.
pub async fn table_exists(db: &DatabaseConnection, table: &str) -> Result<bool, DbErr> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = $1",
            [table.into()],
        ))
        .await?;
    Ok(row.is_some())
}
