//! Pending-reply table keyed by correlation id.

use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

use crate::ipc::{CorrelationId, QueryResponse};

/// Outcome of offering a reply to the table.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    /// A waiting caller received it.
    Resolved,
    /// No caller is registered; the reply was parked.
    Parked,
    /// Parked, and the oldest parked reply was evicted to make room.
    ParkedWithEviction(CorrelationId),
    /// The caller had already gone away.
    Abandoned,
}

#[derive(Debug)]
pub(crate) struct PendingTable {
    waiting: HashMap<CorrelationId, oneshot::Sender<QueryResponse>>,
    parked: VecDeque<QueryResponse>,
    max_parked: usize,
}

impl PendingTable {
    pub(crate) fn new(max_parked: usize) -> Self {
        Self {
            waiting: HashMap::new(),
            parked: VecDeque::new(),
            max_parked,
        }
    }

    pub(crate) fn is_waiting(&self, id: CorrelationId) -> bool {
        self.waiting.contains_key(&id)
    }

    /// Register a listener for `id`. A parked reply with the same id is
    /// handed over immediately.
    pub(crate) fn register(&mut self, id: CorrelationId) -> oneshot::Receiver<QueryResponse> {
        let (tx, rx) = oneshot::channel();

        if let Some(index) = self.parked.iter().position(|r| r.correlation_id == id) {
            if let Some(response) = self.parked.remove(index) {
                let _ = tx.send(response);
                return rx;
            }
        }

        self.waiting.insert(id, tx);
        rx
    }

    /// Drop the listener for `id`, if still registered.
    pub(crate) fn forget(&mut self, id: CorrelationId) -> bool {
        self.waiting.remove(&id).is_some()
    }

    pub(crate) fn deliver(&mut self, response: QueryResponse) -> Delivery {
        match self.waiting.remove(&response.correlation_id) {
            Some(tx) => match tx.send(response) {
                Ok(()) => Delivery::Resolved,
                Err(_) => Delivery::Abandoned,
            },
            None => {
                let mut evicted = None;
                if self.parked.len() >= self.max_parked {
                    evicted = self.parked.pop_front().map(|r| r.correlation_id);
                }
                if self.max_parked > 0 {
                    self.parked.push_back(response);
                }
                match evicted {
                    Some(id) => Delivery::ParkedWithEviction(id),
                    None if self.max_parked == 0 => Delivery::Abandoned,
                    None => Delivery::Parked,
                }
            }
        }
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub(crate) fn parked_len(&self) -> usize {
        self.parked.len()
    }

    pub(crate) fn max_parked(&self) -> usize {
        self.max_parked
    }
}
