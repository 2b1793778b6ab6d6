//! Handler binding: a named set of per-method operations.

use axum::http::Method;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::http::context::{Outcome, RequestContext};
use crate::http::error::HandlerError;

pub type HandlerResult = Result<Outcome, HandlerError>;

/// One verb's implementation.
pub type Operation = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A resource handler bound to a route.
///
/// Operations keep registration order; that order is what `Allow` reports.
/// `OPTIONS` is always answered by the dispatcher and cannot be bound.
pub struct Handler {
    name: &'static str,
    operations: Vec<(Method, Operation)>,
}

impl Handler {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            operations: Vec::new(),
        }
    }

    /// Bind `operation` to `method`, replacing any earlier binding.
    pub fn on<F, Fut>(mut self, method: Method, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if method == Method::OPTIONS {
            tracing::warn!(handler = self.name, "OPTIONS is answered by the dispatcher, ignoring binding");
            return self;
        }

        let operation: Operation =
            Arc::new(move |ctx: RequestContext| -> BoxFuture<'static, HandlerResult> { Box::pin(operation(ctx)) });
        match self.operations.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = operation,
            None => self.operations.push((method, operation)),
        }
        self
    }

    pub fn get<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::GET, operation)
    }

    pub fn post<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::POST, operation)
    }

    pub fn put<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::PUT, operation)
    }

    pub fn patch<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::PATCH, operation)
    }

    pub fn delete<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Method::DELETE, operation)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Bound verbs in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.operations.iter().map(|(m, _)| m)
    }

    pub fn supports(&self, method: &Method) -> bool {
        self.operations.iter().any(|(m, _)| m == method)
    }

    pub fn operation(&self, method: &Method) -> Option<Operation> {
        self.operations
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, op)| Arc::clone(op))
    }

    /// `OPTIONS` followed by every bound verb, comma separated.
    pub fn allowed_methods(&self) -> String {
        std::iter::once(Method::OPTIONS.as_str())
            .chain(self.methods().map(Method::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("methods", &self.allowed_methods())
            .finish()
    }
}
