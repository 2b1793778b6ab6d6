//! Worker-side query relay.
//!
//! # Responsibilities
//! - Turn a statement + parameters into a correlated [`QueryRequest`]
//! - Park the caller on a one-shot future keyed by its correlation id
//! - Resolve or fail that future when the coordinator's reply arrives
//!
//! # Design Decisions
//! - Correlation ids are random `u64`s, redrawn only if already outstanding
//! - Replies with no registered listener are parked (bounded) and handed to
//!   the next registration with the same id
//! - Waits are unbounded unless `relay.query_timeout_secs` is configured
//! - The pending entry is removed on resolution, timeout, or cancellation

mod pending;

pub use pending::Delivery;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::ipc::{CorrelationId, QueryFailure, QueryRequest, QueryResponse, Rows};
use pending::PendingTable;

/// Failure of a relayed query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The coordinator executed the statement and it failed.
    #[error("query failed: {0}")]
    Failed(#[from] QueryFailure),
    /// The outbound channel to the coordinator is gone.
    #[error("coordinator channel closed")]
    ChannelClosed,
    /// No reply within the configured deadline.
    #[error("query timed out after {0:?}")]
    TimedOut(Duration),
    /// The listener was torn down before a reply arrived.
    #[error("query reply was dropped")]
    Dropped,
    /// Rows did not have the shape the caller asked for.
    #[error("failed to decode rows: {0}")]
    Decode(#[from] serde_json::Error),
}

impl QueryError {
    /// Diagnostics reported by the database, if this is an execution failure.
    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            QueryError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

struct Inner {
    outbound: mpsc::UnboundedSender<QueryRequest>,
    pending: Mutex<PendingTable>,
    timeout: Option<Duration>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle used by request handlers to reach the coordinator's database.
///
/// Cheap to clone; all clones share one pending table.
#[derive(Clone)]
pub struct QueryRelay {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.inner.pending();
        f.debug_struct("QueryRelay")
            .field("waiting", &pending.waiting_len())
            .field("parked", &pending.parked_len())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl QueryRelay {
    /// Create a relay that sends requests on `outbound`.
    pub fn new(outbound: mpsc::UnboundedSender<QueryRequest>, config: &RelayConfig) -> Self {
        Self::with_limits(
            outbound,
            config.query_timeout_secs.map(Duration::from_secs),
            config.max_parked_replies,
        )
    }

    pub fn with_limits(
        outbound: mpsc::UnboundedSender<QueryRequest>,
        timeout: Option<Duration>,
        max_parked: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                outbound,
                pending: Mutex::new(PendingTable::new(max_parked)),
                timeout,
            }),
        }
    }

    /// Run `statement` on the coordinator and wait for its rows.
    pub async fn execute(&self, statement: impl Into<String>, parameters: Vec<Value>) -> Result<Rows, QueryError> {
        let (id, reply) = {
            let mut pending = self.inner.pending();
            let id = loop {
                let candidate = fastrand::u64(..);
                if !pending.is_waiting(candidate) {
                    break candidate;
                }
            };
            (id, pending.register(id))
        };
        let _registration = Registration { inner: &self.inner, id };

        let statement = statement.into();
        tracing::trace!(correlation_id = id, statement = %statement, "Relaying query");

        self.inner
            .outbound
            .send(QueryRequest::sql(id, statement, parameters))
            .map_err(|_| QueryError::ChannelClosed)?;

        let response = match self.inner.timeout {
            Some(limit) => tokio::time::timeout(limit, reply)
                .await
                .map_err(|_| QueryError::TimedOut(limit))?,
            None => reply.await,
        }
        .map_err(|_| QueryError::Dropped)?;

        Ok(response.into_result()?)
    }

    /// Like [`execute`](Self::execute), decoding each row into `T`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        statement: impl Into<String>,
        parameters: Vec<Value>,
    ) -> Result<Vec<T>, QueryError> {
        self.execute(statement, parameters)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(QueryError::from))
            .collect()
    }

    /// First row decoded into `T`, if any.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        statement: impl Into<String>,
        parameters: Vec<Value>,
    ) -> Result<Option<T>, QueryError> {
        Ok(self.fetch(statement, parameters).await?.into_iter().next())
    }

    /// Hand an inbound reply to whichever caller is waiting for it.
    pub fn deliver(&self, response: QueryResponse) -> Delivery {
        let id = response.correlation_id;
        let delivery = self.inner.pending().deliver(response);
        match delivery {
            Delivery::Resolved => {}
            Delivery::Parked => {
                tracing::debug!(correlation_id = id, "Parked reply with no listener");
            }
            Delivery::ParkedWithEviction(evicted) => {
                tracing::warn!(
                    correlation_id = id,
                    evicted_correlation_id = evicted,
                    "Parked reply limit reached, evicted oldest"
                );
            }
            Delivery::Abandoned => {
                tracing::debug!(correlation_id = id, "Reply arrived after its caller went away");
            }
        }
        delivery
    }

    /// Fail every waiting caller. Used once the coordinator link is gone.
    pub fn abandon_all(&self) -> usize {
        let mut pending = self.inner.pending();
        let count = pending.waiting_len();
        let max_parked = pending.max_parked();
        *pending = PendingTable::new(max_parked);
        count
    }

    /// Callers currently waiting on a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending().waiting_len()
    }

    /// Replies currently parked without a listener.
    pub fn parked_count(&self) -> usize {
        self.inner.pending().parked_len()
    }
}

/// Removes the pending entry when the call finishes or is cancelled.
struct Registration<'a> {
    inner: &'a Inner,
    id: CorrelationId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.inner.pending().forget(self.id);
    }
}
