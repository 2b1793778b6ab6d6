//! `/guilds/{id}`: list and show guilds.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{Handler, HandlerResult, Reply, RequestContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub owner: i64,
}

pub fn handler() -> Handler {
    Handler::new("Guilds").get(get)
}

async fn get(ctx: RequestContext) -> HandlerResult {
    let Some(id) = ctx.param("id").map(str::to_string) else {
        let guilds: Vec<Guild> = ctx
            .db()
            .fetch("SELECT id, name, icon, owner FROM guilds ORDER BY id", vec![])
            .await?;
        return Ok(ctx.respond(Reply::json(&guilds)?));
    };

    let Ok(id) = id.parse::<i64>() else {
        return Ok(ctx.not_found("Guild not found"));
    };

    let guild: Option<Guild> = ctx
        .db()
        .fetch_one("SELECT id, name, icon, owner FROM guilds WHERE id = $1", vec![json!(id)])
        .await?;

    match guild {
        Some(guild) => Ok(ctx.respond(Reply::json(&guild)?)),
        None => Ok(ctx.not_found("Guild not found")),
    }
}
