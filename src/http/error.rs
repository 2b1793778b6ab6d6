//! Request-level error taxonomy.
//!
//! Every failure the dispatcher can answer on its own maps to exactly one
//! status code here. Handler failures never leak their message to the client.

use axum::body::Body;
use axum::http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use axum::http::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::relay::QueryError;

/// Failure raised inside a handler operation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Internal(String),
}

/// Request body could not be accepted.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Length Required")]
    LengthRequired,
    #[error("Invalid Content-Length")]
    InvalidLength,
    #[error("Payload Too Large")]
    TooLarge,
    #[error("Malformed JSON body")]
    MalformedJson(#[source] serde_json::Error),
    #[error("Failed to read request body")]
    Read(#[source] axum::Error),
}

/// Everything the dispatcher answers without a successful handler reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Not Found")]
    NotFound,
    #[error("Not Implemented")]
    UnknownMethod,
    #[error("Method Not Allowed")]
    MethodNotAllowed { allow: String },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("Request Timeout")]
    Timeout(Duration),
    #[error("Internal Server Error")]
    Handler(#[source] HandlerError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::UnknownMethod => StatusCode::NOT_IMPLEMENTED,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Payload(PayloadError::LengthRequired) => StatusCode::LENGTH_REQUIRED,
            DispatchError::Payload(PayloadError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::Payload(_) => StatusCode::BAD_REQUEST,
            DispatchError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text response carrying this error's message.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status();
        let mut response = Response::new(Body::from(self.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        if let DispatchError::MethodNotAllowed { allow } = &self {
            if let Ok(value) = HeaderValue::from_str(allow) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}
