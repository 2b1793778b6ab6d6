//! Statement execution against the coordinator's pool.
//!
//! # Responsibilities
//! - Bind JSON parameters positionally
//! - Return rows as JSON objects keyed by column name
//! - Turn driver errors into [`QueryFailure`] with the driver's diagnostics
//!
//! # Design Decisions
//! - The [`Executor`] trait is the seam between the coordinator loop and
//!   the database, so supervision can be tested without one
//! - Statements are passed through verbatim; placeholders follow the
//!   driver's syntax (`$1`, `$2`, ... for SQLite)

use futures_util::future::BoxFuture;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, JsonValue, RuntimeErr, Statement,
    Value as SqlValue,
};
use serde_json::Value;

use crate::ipc::{QueryFailure, Rows};

/// Runs a statement and returns its rows.
pub trait Executor: Send + Sync + 'static {
    fn execute<'a>(&'a self, statement: &'a str, parameters: &'a [Value]) -> BoxFuture<'a, Result<Rows, QueryFailure>>;
}

/// [`Executor`] backed by a sea-orm connection pool.
#[derive(Debug, Clone)]
pub struct SqlExecutor {
    db: DatabaseConnection,
}

impl SqlExecutor {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn run(&self, statement: &str, parameters: &[Value]) -> Result<Rows, QueryFailure> {
        let values: Vec<SqlValue> = parameters.iter().map(bind_value).collect();
        let statement = Statement::from_sql_and_values(self.db.get_database_backend(), statement, values);

        JsonValue::find_by_statement(statement)
            .all(&self.db)
            .await
            .map_err(|err| describe_failure(&err))
    }
}

impl Executor for SqlExecutor {
    fn execute<'a>(&'a self, statement: &'a str, parameters: &'a [Value]) -> BoxFuture<'a, Result<Rows, QueryFailure>> {
        Box::pin(self.run(statement, parameters))
    }
}

/// Map one JSON parameter to a bindable value.
pub fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::from(None::<String>),
        Value::Bool(b) => SqlValue::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::from(i),
            None => SqlValue::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::from(s.clone()),
        other => SqlValue::from(other.to_string()),
    }
}

/// Extract driver diagnostics from a sea-orm error.
pub fn describe_failure(err: &DbErr) -> QueryFailure {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => Some(e),
        _ => None,
    };

    if let Some(RuntimeErr::SqlxError(sqlx_err)) = runtime {
        if let Some(db_err) = sqlx_err.as_database_error() {
            return QueryFailure {
                message: db_err.message().to_string(),
                code: db_err.code().map(|code| code.into_owned()),
                constraint: db_err.constraint().map(str::to_string),
                table: db_err.table().map(str::to_string),
            };
        }
    }

    QueryFailure::new(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::lifecycle::connect_database;
    use serde_json::json;

    async fn executor() -> SqlExecutor {
        let config = DatabaseConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            sqlx_logging: false,
            bootstrap_schema: true,
        };
        SqlExecutor::new(connect_database(&config).await.unwrap())
    }

    #[test]
    fn binds_json_scalars() {
        assert_eq!(bind_value(&json!(7)), SqlValue::from(7i64));
        assert_eq!(bind_value(&json!(1.5)), SqlValue::from(1.5f64));
        assert_eq!(bind_value(&json!(true)), SqlValue::from(true));
        assert_eq!(bind_value(&json!("ana")), SqlValue::from("ana".to_string()));
        assert_eq!(bind_value(&Value::Null), SqlValue::from(None::<String>));
        assert_eq!(bind_value(&json!([1, 2])), SqlValue::from("[1,2]".to_string()));
    }

    #[tokio::test]
    async fn insert_then_select_returns_objects() {
        let executor = executor().await;

        let inserted = executor
            .execute(
                "INSERT INTO users (username) VALUES ($1) RETURNING id, username",
                &[json!("ana")],
            )
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["username"], json!("ana"));

        let rows = executor
            .execute("SELECT id, username FROM users WHERE username = $1", &[json!("ana")])
            .await
            .unwrap();
        assert_eq!(rows, inserted);
    }

    #[tokio::test]
    async fn constraint_violation_keeps_driver_diagnostics() {
        let executor = executor().await;
        let insert = "INSERT INTO users (username) VALUES ($1)";
        executor.execute(insert, &[json!("dup")]).await.unwrap();

        let failure = executor.execute(insert, &[json!("dup")]).await.unwrap_err();
        assert!(failure.message.contains("UNIQUE"), "{failure:?}");
        assert!(failure.code.is_some());
    }

    #[tokio::test]
    async fn syntax_error_is_a_failure_not_a_panic() {
        let executor = executor().await;
        let failure = executor.execute("SELEC nothing", &[]).await.unwrap_err();
        assert!(!failure.message.is_empty());
    }
}
