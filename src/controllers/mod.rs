//! Resource handlers served by every worker.
//!
//! Registration order is precedence order: register specific templates
//! before overlapping general ones.

pub mod guilds;
pub mod index;
pub mod users;

use std::sync::Arc;

use crate::routing::{RouteError, RouteTable};

/// Register every bundled resource on `table`.
pub fn register_all(table: &mut RouteTable) -> Result<(), RouteError> {
    table.register("/", Arc::new(index::handler()))?;
    table.register("/users/{id}", Arc::new(users::handler()))?;
    table.register("/guilds/{id}", Arc::new(guilds::handler()))?;
    Ok(())
}

/// The route table a worker serves.
pub fn routes() -> Result<RouteTable, RouteError> {
    let mut table = RouteTable::new();
    register_all(&mut table)?;
    Ok(table)
}
