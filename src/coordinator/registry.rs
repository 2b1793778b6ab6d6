//! Worker registry.
//!
//! # Responsibilities
//! - Generate unique worker ids for logging and reply routing
//! - Track each worker's pid and liveness
//! - Count spawns and exits over the coordinator's lifetime

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global atomic counter for worker ids.
/// Relaxed ordering is enough: only uniqueness matters.
static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a spawned worker. Never reused, including for
/// replacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn new() -> Self {
        Self(WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Liveness of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Exited,
}

#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub pid: Option<u32>,
    pub state: WorkerState,
    pub started_at: Instant,
}

/// Concurrent map of live workers.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: DashMap<WorkerId, WorkerEntry>,
    spawned: AtomicU64,
    exited: AtomicU64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: WorkerId, pid: Option<u32>) {
        self.workers.insert(
            id,
            WorkerEntry {
                pid,
                state: WorkerState::Running,
                started_at: Instant::now(),
            },
        );
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Flag `id` as exited. Returns false if it was not registered.
    pub fn mark_exited(&self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(mut entry) => {
                entry.state = WorkerState::Exited;
                self.exited.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: WorkerId) -> Option<WorkerEntry> {
        self.workers.remove(&id).map(|(_, entry)| entry)
    }

    pub fn get(&self, id: WorkerId) -> Option<WorkerEntry> {
        self.workers.get(&id).map(|entry| entry.clone())
    }

    /// Workers currently in the `Running` state.
    pub fn running(&self) -> usize {
        self.workers
            .iter()
            .filter(|entry| entry.state == WorkerState::Running)
            .count()
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.workers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Total workers ever registered.
    pub fn spawned_total(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Total workers ever observed exiting.
    pub fn exited_total(&self) -> u64 {
        self.exited.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = WorkerId::new();
        let b = WorkerId::new();
        assert_ne!(a, b);
        assert!(b.to_string().starts_with("worker-"));
    }

    #[test]
    fn exit_then_remove() {
        let registry = WorkerRegistry::new();
        let id = WorkerId::new();
        registry.register(id, Some(42));
        assert_eq!(registry.running(), 1);

        assert!(registry.mark_exited(id));
        assert_eq!(registry.running(), 0);
        assert_eq!(registry.get(id).unwrap().state, WorkerState::Exited);

        assert_eq!(registry.remove(id).unwrap().pid, Some(42));
        assert!(registry.is_empty());
        assert!(!registry.mark_exited(id));
        assert_eq!(registry.spawned_total(), 1);
        assert_eq!(registry.exited_total(), 1);
    }
}
