//! `/users/{id}`: list, show and create users.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{Handler, HandlerResult, Reply, RequestContext};
use crate::ipc::QueryFailure;
use crate::relay::QueryError;

pub const MAX_USERNAME_CHARS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

pub fn handler() -> Handler {
    Handler::new("Users").get(get).post(create)
}

async fn get(ctx: RequestContext) -> HandlerResult {
    match ctx.param("id") {
        Some(id) => {
            let id = id.to_string();
            show(ctx, &id).await
        }
        None => list(ctx).await,
    }
}

async fn list(ctx: RequestContext) -> HandlerResult {
    let users: Vec<User> = ctx
        .db()
        .fetch("SELECT id, username FROM users ORDER BY id", vec![])
        .await?;
    Ok(ctx.respond(Reply::json(&users)?))
}

async fn show(ctx: RequestContext, id: &str) -> HandlerResult {
    let Ok(id) = id.parse::<i64>() else {
        return Ok(ctx.not_found("User not found"));
    };

    let user: Option<User> = ctx
        .db()
        .fetch_one("SELECT id, username FROM users WHERE id = $1", vec![json!(id)])
        .await?;

    match user {
        Some(user) => Ok(ctx.respond(Reply::json(&user)?)),
        None => Ok(ctx.not_found("User not found")),
    }
}

async fn create(mut ctx: RequestContext) -> HandlerResult {
    let username = ctx
        .json_body()
        .and_then(|body| body.get("username"))
        .and_then(|value| value.as_str())
        .map(str::trim)
        .map(str::to_string);

    let username = match username {
        Some(name) if validate_username(&name) => name,
        _ => {
            return Ok(ctx.respond(Reply::error(format!(
                "username must be between 1 and {MAX_USERNAME_CHARS} characters"
            ))))
        }
    };

    let created = ctx
        .db()
        .fetch_one::<User>(
            "INSERT INTO users (username) VALUES ($1) RETURNING id, username",
            vec![json!(username)],
        )
        .await;

    match created {
        Ok(Some(user)) => {
            tracing::info!(user_id = user.id, "User created");
            ctx.set_status(StatusCode::CREATED);
            Ok(ctx.respond(Reply::json(&user)?))
        }
        Ok(None) => Err(crate::http::HandlerError::Internal("insert returned no row".into())),
        Err(QueryError::Failed(failure)) if is_unique_violation(&failure) => {
            Ok(ctx.reject(StatusCode::CONFLICT, "Username already taken"))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn validate_username(name: &str) -> bool {
    let chars = name.chars().count();
    (1..=MAX_USERNAME_CHARS).contains(&chars)
}

/// Unique-constraint violation, by SQLite extended code or SQLSTATE.
pub fn is_unique_violation(failure: &QueryFailure) -> bool {
    matches!(failure.code.as_deref(), Some("2067") | Some("1555") | Some("23505"))
}
