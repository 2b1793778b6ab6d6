//! Request dispatch: route lookup, method gating, body reading and handler
//! invocation.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → RouteTable::lookup (404 on miss)
//!     → method gate (501 unknown verb, 405 unbound verb, OPTIONS answered here)
//!     → body reader (411 / 400 / 413 / 408, JSON parsed on content type)
//!     → handler operation (panics and errors become 500)
//!     → CORS headers for OPTIONS/POST/PUT/PATCH
//!     → one access log line
//! ```
//!
//! # Design Decisions
//! - Body limits are checked against Content-Length before reading, then
//!   enforced again while streaming
//! - A handler failure never carries its message to the client

use axum::body::{Body, Bytes};
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ALLOW, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderMap, Method, Request, Response};
use futures_util::{FutureExt, StreamExt};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::HttpConfig;
use crate::http::context::{ContextParts, QueryParams, RequestBody, RequestContext};
use crate::http::error::{DispatchError, HandlerError, PayloadError};
use crate::relay::QueryRelay;
use crate::routing::RouteTable;

const CORS_ALLOWED_HEADERS: &str = "Content-Type, Accept, Authorization";

/// Limits applied while reading request bodies.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_bytes: u64,
    pub read_timeout: Duration,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for BodyLimits {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_bytes: config.max_body_bytes,
            read_timeout: Duration::from_secs(config.body_read_timeout_secs),
        }
    }
}

/// Verbs the dispatcher recognizes at all. Anything else is 501.
pub fn is_known_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::POST
            | Method::PUT
            | Method::DELETE
            | Method::CONNECT
            | Method::OPTIONS
            | Method::TRACE
            | Method::PATCH
    )
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn wants_cors(method: &Method) -> bool {
    *method == Method::OPTIONS || carries_body(method)
}

/// Route and handler that served a request, for the access log.
#[derive(Debug, Default)]
struct Served {
    route: Option<String>,
    handler: Option<&'static str>,
}

/// Shared request dispatcher. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    relay: QueryRelay,
    limits: BodyLimits,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, relay: QueryRelay, limits: BodyLimits) -> Self {
        Self { routes, relay, limits }
    }

    /// Serve one request. Never fails; every error becomes a response.
    pub async fn dispatch(&self, request: Request<Body>, remote_addr: SocketAddr) -> Response<Body> {
        let received_at = Instant::now();
        let request_id = Uuid::new_v4();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (response, served) = self.route(request, remote_addr, request_id, received_at).await;

        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            route = served.route.as_deref().unwrap_or("-"),
            handler = served.handler.unwrap_or("-"),
            remote = %remote_addr,
            status = response.status().as_u16(),
            elapsed_ms = received_at.elapsed().as_millis() as u64,
            "{} {} {}",
            method,
            path,
            response.status().as_u16()
        );

        response
    }

    async fn route(
        &self,
        request: Request<Body>,
        remote_addr: SocketAddr,
        request_id: Uuid,
        received_at: Instant,
    ) -> (Response<Body>, Served) {
        let path = request.uri().path().to_string();
        let Some(route) = self.routes.lookup(&path) else {
            return (DispatchError::NotFound.into_response(), Served::default());
        };

        let handler = Arc::clone(route.handler());
        let served = Served {
            route: Some(route.pattern().to_string()),
            handler: Some(handler.name()),
        };
        let method = request.method().clone();
        let allowed = handler.allowed_methods();

        if !is_known_method(&method) {
            return (DispatchError::UnknownMethod.into_response(), served);
        }

        let cors = if wants_cors(&method) {
            cors_headers(&allowed)
        } else {
            HeaderMap::new()
        };

        if method == Method::OPTIONS {
            let mut response = Response::new(Body::empty());
            if let Ok(value) = HeaderValue::from_str(&allowed) {
                response.headers_mut().insert(ALLOW, value);
            }
            return (with_headers(response, cors), served);
        }

        let Some(operation) = handler.operation(&method) else {
            let error = DispatchError::MethodNotAllowed { allow: allowed };
            return (error.into_response(), served);
        };

        let params = route.extract(&path);
        let (parts, body) = request.into_parts();
        let query = QueryParams::parse(parts.uri.query());

        let body = if carries_body(&method) {
            match self.read_body(&parts.headers, body).await {
                Ok(body) => Some(body),
                Err(error) => {
                    tracing::debug!(request_id = %request_id, error = %error, "Rejected request body");
                    return (with_headers(error.into_response(), cors), served);
                }
            }
        } else {
            None
        };

        let ctx = RequestContext::new(ContextParts {
            id: request_id,
            method,
            uri: parts.uri,
            headers: parts.headers,
            remote_addr,
            route: route.pattern().to_string(),
            handler: handler.name(),
            params,
            query,
            body,
            relay: self.relay.clone(),
            received_at,
        });

        let invocation = async move { operation(ctx).await };
        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
        };

        let response = match result {
            Ok(outcome) => outcome.into_response(),
            Err(error) => {
                tracing::error!(
                    request_id = %request_id,
                    handler = handler.name(),
                    error = %error,
                    "Handler failed"
                );
                DispatchError::Handler(error).into_response()
            }
        };

        (with_headers(response, cors), served)
    }

    async fn read_body(&self, headers: &HeaderMap, body: Body) -> Result<RequestBody, DispatchError> {
        let declared = headers
            .get(CONTENT_LENGTH)
            .ok_or(PayloadError::LengthRequired)?
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or(PayloadError::InvalidLength)?;

        if declared > self.limits.max_bytes {
            return Err(PayloadError::TooLarge.into());
        }

        let bytes = tokio::time::timeout(self.limits.read_timeout, collect_limited(body, self.limits.max_bytes))
            .await
            .map_err(|_| DispatchError::Timeout(self.limits.read_timeout))??;

        if is_json(headers) {
            let value = serde_json::from_slice(&bytes).map_err(PayloadError::MalformedJson)?;
            Ok(RequestBody::Json(value))
        } else {
            Ok(RequestBody::Raw(bytes))
        }
    }
}

async fn collect_limited(body: Body, max_bytes: u64) -> Result<Bytes, PayloadError> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(PayloadError::Read)?;
        if (buffer.len() + chunk.len()) as u64 > max_bytes {
            return Err(PayloadError::TooLarge);
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffer))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn cors_headers(allowed: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOWED_HEADERS));
    if let Ok(value) = HeaderValue::from_str(allowed) {
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    headers
}

fn with_headers(mut response: Response<Body>, headers: HeaderMap) -> Response<Body> {
    response.headers_mut().extend(headers);
    response
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
