use std::{sync::Arc, time::Duration};

/// Final outcome of a claimed rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Succeeded => "succeeded",
            TaskOutcome::Failed => "failed",
        }
    }
}

/// Metrics sink for the worker and the span exporter.
///
/// Implementations must be cheap and non-blocking; they are called inline
/// from the worker loop.
pub trait MetricsBackend: Send + Sync + 'static {
    fn record_rollout_claimed(&self);
    fn record_rollout_completed(&self, outcome: TaskOutcome, duration: Duration);
    fn record_empty_poll(&self);
    fn record_transport_error(&self, operation: &'static str);
    fn record_heartbeat_failure(&self);
    /// `outcome` is one of `sent`, `orphan`, `send_failed`, `correlation_failed`.
    fn record_span_exported(&self, outcome: &'static str);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_rollout_claimed(&self) {}
    fn record_rollout_completed(&self, _outcome: TaskOutcome, _duration: Duration) {}
    fn record_empty_poll(&self) {}
    fn record_transport_error(&self, _operation: &'static str) {}
    fn record_heartbeat_failure(&self) {}
    fn record_span_exported(&self, _outcome: &'static str) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}
