//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route accepting a path
//! - Zip positional captures with parameter names
//!
//! # Design Decisions
//! - Immutable after startup (shared via `Arc`, no locks)
//! - O(n) scan, first match wins; registration order is the precedence order
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;
use thiserror::Error;

use crate::http::handler::Handler;
use crate::routing::matcher::{CompiledMatcher, PatternError};

/// Error raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("tried to register route {0} with no handler operations")]
    MissingHandler(String),
}

/// A registered route.
#[derive(Debug)]
pub struct Route {
    pattern: String,
    matcher: CompiledMatcher,
    handler: Arc<Handler>,
}

impl Route {
    /// The template this route was registered with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Parameter names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        self.matcher.parameter_names()
    }

    /// Resolve path parameters for `path`.
    ///
    /// Extraction stops at the first capture that is absent (or empty), so an
    /// omitted optional trailing segment never yields a partial entry.
    pub fn extract(&self, path: &str) -> PathParams {
        let mut params = PathParams::default();
        let Some(captures) = self.matcher.captures(path) else {
            return params;
        };

        for (name, value) in self.matcher.parameter_names().iter().zip(captures) {
            match value {
                Some(value) if !value.is_empty() => params.0.push((name.clone(), value)),
                _ => break,
            }
        }
        params
    }
}

/// Path parameters, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered collection of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `pattern`.
    ///
    /// More specific routes must be registered before overlapping general ones.
    pub fn register(&mut self, pattern: &str, handler: Arc<Handler>) -> Result<(), RouteError> {
        if handler.is_empty() {
            return Err(RouteError::MissingHandler(pattern.to_string()));
        }

        let matcher = CompiledMatcher::compile(pattern)?;
        tracing::debug!(
            pattern = %pattern,
            regex = %matcher.as_str(),
            handler = handler.name(),
            "Route registered"
        );

        self.routes.push(Route {
            pattern: pattern.to_string(),
            matcher,
            handler,
        });
        Ok(())
    }

    /// First route whose matcher accepts `path`.
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.is_match(path))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::Reply;

    fn handler(name: &'static str) -> Arc<Handler> {
        Arc::new(Handler::new(name).get(|ctx| async move { Ok(ctx.respond(Reply::Empty)) }))
    }

    #[test]
    fn first_registered_match_wins() {
        let mut table = RouteTable::new();
        table.register("/users/{id}", handler("Users")).unwrap();
        table.register("/users/special", handler("Special")).unwrap();

        let route = table.lookup("/users/special").unwrap();
        assert_eq!(route.pattern(), "/users/{id}");
        assert_eq!(route.handler().name(), "Users");
        assert_eq!(route.extract("/users/special").get("id"), Some("special"));
    }

    #[test]
    fn specific_routes_registered_first_take_precedence() {
        let mut table = RouteTable::new();
        table.register("/users/special", handler("Special")).unwrap();
        table.register("/users/{id}", handler("Users")).unwrap();

        assert_eq!(table.lookup("/users/special").unwrap().handler().name(), "Special");
        assert_eq!(table.lookup("/users/1").unwrap().handler().name(), "Users");
    }

    #[test]
    fn lookup_miss_returns_none() {
        let mut table = RouteTable::new();
        table.register("/", handler("Index")).unwrap();
        table.register("/guilds/{id}", handler("Guilds")).unwrap();

        assert!(table.lookup("/channels/3").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn extraction_stops_at_missing_capture() {
        let mut table = RouteTable::new();
        table
            .register("/guilds/{guild}/channels/{channel}", handler("Channels"))
            .unwrap();
        let route = table.lookup("/guilds/5/channels").unwrap();

        let params = route.extract("/guilds/5/channels");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("guild"), Some("5"));
        assert_eq!(params.get("channel"), None);

        let params = route.extract("/guilds/5/channels/8");
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("guild", "5"), ("channel", "8")]);
    }

    #[test]
    fn handler_without_operations_is_rejected() {
        let mut table = RouteTable::new();
        let err = table
            .register("/empty", Arc::new(Handler::new("Empty")))
            .unwrap_err();
        assert!(matches!(err, RouteError::MissingHandler(p) if p == "/empty"));
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_pattern_is_a_route_error() {
        let mut table = RouteTable::new();
        let err = table.register("/users/{id", handler("Users")).unwrap_err();
        assert!(matches!(err, RouteError::Pattern(_)));
    }
}
