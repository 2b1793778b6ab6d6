//! Service banner at `/`.

use crate::http::{Handler, HandlerResult, RequestContext};

pub const BANNER: &str = "DiscardApp";

pub fn handler() -> Handler {
    Handler::new("Index").get(banner)
}

async fn banner(ctx: RequestContext) -> HandlerResult {
    Ok(ctx.respond(BANNER))
}
