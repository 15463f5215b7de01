use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use agl_model::{AttemptId, RolloutId};

/// Rollout/attempt pair created for a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub rollout_id: RolloutId,
    pub attempt_id: AttemptId,
}

#[derive(Default)]
struct Tables {
    traces: HashMap<String, Correlation>,
    sequences: HashMap<RolloutId, u64>,
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
}

/// Trace-to-rollout table and per-rollout sequence counters.
///
/// Unbounded and in-memory: entries live until [`CorrelationStore::drain`].
#[derive(Default)]
pub struct CorrelationStore {
    tables: Mutex<Tables>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize lookup-or-create for one trace id.
    ///
    /// Holders of the guard for the same trace run one at a time; other
    /// traces are not blocked. The lock entry is dropped with the last guard
    /// that uses it.
    pub async fn lock_trace(&self, trace_id: &str) -> TraceGuard<'_> {
        let lock = self
            .tables()
            .locks
            .entry(trace_id.to_string())
            .or_default()
            .clone();
        let guard = lock.clone().lock_owned().await;
        TraceGuard {
            store: self,
            trace_id: trace_id.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of trace locks currently held or awaited.
    pub fn lock_count(&self) -> usize {
        self.tables().locks.len()
    }

    pub fn get(&self, trace_id: &str) -> Option<Correlation> {
        self.tables().traces.get(trace_id).cloned()
    }

    /// Register a trace and reset its rollout's sequence counter to 0.
    pub fn insert(&self, trace_id: &str, correlation: Correlation) {
        let mut tables = self.tables();
        tables.sequences.insert(correlation.rollout_id.clone(), 0);
        tables.traces.insert(trace_id.to_string(), correlation);
    }

    /// Current sequence number for the rollout; the counter moves past it.
    pub fn next_sequence(&self, rollout_id: &RolloutId) -> u64 {
        let mut tables = self.tables();
        let counter = tables.sequences.entry(rollout_id.clone()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }

    pub fn len(&self) -> usize {
        self.tables().traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry and counter, returning the open correlations.
    pub fn drain(&self) -> Vec<Correlation> {
        let mut tables = self.tables();
        tables.sequences.clear();
        tables.locks.clear();
        tables.traces.drain().map(|(_, c)| c).collect()
    }
}

/// Exclusive access to one trace id, from [`CorrelationStore::lock_trace`].
pub struct TraceGuard<'a> {
    store: &'a CorrelationStore,
    trace_id: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut tables = self.store.tables();
        // One reference is ours, one the table's; any other belongs to a
        // waiter that still needs the entry.
        let unused = tables
            .locks
            .get(&self.trace_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if unused {
            tables.locks.remove(&self.trace_id);
        }
    }
}
