//! Per-request state handed to handler operations.
//!
//! # Responsibilities
//! - Carry transport metadata, resolved path/query parameters and the body
//! - Hold the response status chosen by the handler
//! - Turn the handler's reply into exactly one response
//!
//! # Design Decisions
//! - `respond` consumes the context: a second write does not type-check
//! - Status defaults (200, or 400 for error replies) are applied at write
//!   time, never at construction
//! - The query relay travels with the context so handlers never see the
//!   database directly

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Response, StatusCode, Uri};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::http::error::HandlerError;
use crate::relay::QueryRelay;
use crate::routing::PathParams;

/// Parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Body declared as `application/json`.
    Json(Value),
    /// Any other content type, kept as received.
    Raw(Bytes),
}

/// Query-string parameters in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        match query {
            Some(query) => Self(
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect(),
            ),
            None => Self::default(),
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a handler answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Structured value, sent as JSON.
    Json(Value),
    /// Plain text.
    Text(String),
    /// Empty body.
    Empty,
    /// Client-facing error message; status defaults to 400.
    Error(String),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<Vec<Value>> for Reply {
    fn from(rows: Vec<Value>) -> Self {
        Reply::Json(Value::Array(rows))
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// A written response: final status plus reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    status: StatusCode,
    reply: Reply,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn into_response(self) -> Response<Body> {
        let (content_type, body) = match self.reply {
            Reply::Json(value) => ("application/json", Body::from(value.to_string())),
            Reply::Text(text) => ("text/plain; charset=utf-8", Body::from(text)),
            Reply::Empty => ("text/plain; charset=utf-8", Body::empty()),
            Reply::Error(message) => ("text/plain; charset=utf-8", Body::from(message)),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

/// Everything a handler operation knows about its request.
#[derive(Debug)]
pub struct RequestContext {
    id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: SocketAddr,
    route: String,
    handler: &'static str,
    status: Option<StatusCode>,
    params: PathParams,
    query: QueryParams,
    body: Option<RequestBody>,
    relay: QueryRelay,
    received_at: Instant,
}

/// Fields the dispatcher resolves before invoking a handler.
pub(crate) struct ContextParts {
    pub id: Uuid,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: SocketAddr,
    pub route: String,
    pub handler: &'static str,
    pub params: PathParams,
    pub query: QueryParams,
    pub body: Option<RequestBody>,
    pub relay: QueryRelay,
    pub received_at: Instant,
}

impl RequestContext {
    pub(crate) fn new(parts: ContextParts) -> Self {
        Self {
            id: parts.id,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            remote_addr: parts.remote_addr,
            route: parts.route,
            handler: parts.handler,
            status: None,
            params: parts.params,
            query: parts.query,
            body: parts.body,
            relay: parts.relay,
            received_at: parts.received_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Template of the route that matched.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler
    }

    /// Path parameter by placeholder name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Body as JSON, when it was sent as JSON.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Relay to the coordinator's database.
    pub fn db(&self) -> &QueryRelay {
        &self.relay
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// Write the response. Consumes the context.
    pub fn respond(self, reply: impl Into<Reply>) -> Outcome {
        let reply = reply.into();
        let status = match &reply {
            Reply::Error(_) => self.status.unwrap_or(StatusCode::BAD_REQUEST),
            _ => self.status.unwrap_or(StatusCode::OK),
        };
        let reply = match reply {
            Reply::Error(message) if message.is_empty() => Reply::Error(
                status
                    .canonical_reason()
                    .unwrap_or("Bad Request")
                    .to_string(),
            ),
            other => other,
        };
        Outcome { status, reply }
    }

    /// Respond 404 with `message`.
    pub fn not_found(mut self, message: impl Into<String>) -> Outcome {
        self.status = Some(StatusCode::NOT_FOUND);
        self.respond(Reply::Error(message.into()))
    }

    /// Respond with an error message under `status`.
    pub fn reject(mut self, status: StatusCode, message: impl Into<String>) -> Outcome {
        self.status = Some(status);
        self.respond(Reply::Error(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn context() -> RequestContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        RequestContext::new(ContextParts {
            id: Uuid::new_v4(),
            method: Method::GET,
            uri: "/users/1?fields=a&fields=b".parse().unwrap(),
            headers: HeaderMap::new(),
            remote_addr: "127.0.0.1:4000".parse().unwrap(),
            route: "/users/{id}".to_string(),
            handler: "Users",
            params: PathParams::default(),
            query: QueryParams::parse(Some("fields=a&fields=b&q=hello%20world")),
            body: None,
            relay: QueryRelay::with_limits(tx, None, 0),
            received_at: Instant::now(),
        })
    }

    #[test]
    fn status_defaults_apply_at_write_time() {
        assert_eq!(context().respond("ok").status(), StatusCode::OK);
        assert_eq!(context().respond(Reply::error("nope")).status(), StatusCode::BAD_REQUEST);

        let mut ctx = context();
        ctx.set_status(StatusCode::CONFLICT);
        let outcome = ctx.respond(Reply::error("taken"));
        assert_eq!(outcome.status(), StatusCode::CONFLICT);
        assert_eq!(outcome.reply(), &Reply::Error("taken".into()));
    }

    #[test]
    fn empty_error_message_falls_back_to_reason() {
        let outcome = context().not_found("");
        assert_eq!(outcome.status(), StatusCode::NOT_FOUND);
        assert_eq!(outcome.reply(), &Reply::Error("Not Found".into()));
    }

    #[test]
    fn json_reply_sets_content_type() {
        let response = context().respond(json!({"id": 1})).into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn query_parameters_keep_order_and_decode() {
        let ctx = context();
        assert_eq!(ctx.query().get("fields"), Some("a"));
        assert_eq!(ctx.query().get_all("fields").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ctx.query().get("q"), Some("hello world"));
        assert_eq!(ctx.path(), "/users/1");
    }
}
