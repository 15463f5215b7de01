use std::time::SystemTime;

use async_trait::async_trait;

use agl_model::{AttemptId, RolloutId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkerStarted,
    WorkerStopped,
    RolloutClaimed,
    QueueEmpty,
    TaskSucceeded,
    TaskFailed,
    TransportFailed,
    HeartbeatFailed,
}

/// Something that happened inside the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub kind: EventKind,
    pub at: SystemTime,
    pub worker_id: String,
    pub rollout_id: Option<RolloutId>,
    pub attempt_id: Option<AttemptId>,
    /// Queue operation that failed, for transport errors.
    pub operation: Option<&'static str>,
    pub reason: Option<String>,
    pub duration_ms: Option<u64>,
}

impl WorkerEvent {
    pub fn new(kind: EventKind, worker_id: impl Into<String>) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            worker_id: worker_id.into(),
            rollout_id: None,
            attempt_id: None,
            operation: None,
            reason: None,
            duration_ms: None,
        }
    }

    pub fn with_rollout(mut self, rollout_id: &RolloutId, attempt_id: &AttemptId) -> Self {
        self.rollout_id = Some(rollout_id.clone());
        self.attempt_id = Some(attempt_id.clone());
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Receives worker events in publication order.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &WorkerEvent);

    fn name(&self) -> &'static str {
        "subscriber"
    }
}
