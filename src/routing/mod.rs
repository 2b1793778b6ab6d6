//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     (template, Handler)[] in registration order
//!     → matcher.rs (template → anchored regex + parameter names)
//!     → router.rs (append to RouteTable)
//!     → Freeze as immutable Arc<RouteTable>
//!
//! Incoming request path
//!     → router.rs (first route whose matcher accepts the path)
//!     → Route::extract (captures zipped with parameter names)
//!     → Return: matched Route or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{CompiledMatcher, PatternError};
pub use router::{PathParams, Route, RouteError, RouteTable};
