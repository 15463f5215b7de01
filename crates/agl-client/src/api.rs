use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agl_model::{
    AttemptId, AttemptUpdate, AttemptedRollout, EnqueueRequest, Health, HeartbeatStats,
    Resources, Rollout, RolloutId, RolloutPage, RolloutQuery, RolloutUpdate, SpanRecord,
};

use crate::errors::ClientError;

/// Rollout counts derived from a bounded query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_rollouts: usize,
}

/// Operations the queue server exposes.
///
/// Implemented by [`crate::QueueClient`] over HTTP. Every error is a
/// transport-level [`ClientError`]; retry policy belongs to the caller.
#[async_trait]
pub trait QueueApi: Send + Sync + 'static {
    /// Liveness probe.
    async fn health(&self) -> Result<Health, ClientError>;

    /// Create a rollout in `queuing` state.
    async fn enqueue_rollout(&self, request: EnqueueRequest) -> Result<Rollout, ClientError>;

    /// Claim the next eligible rollout and start an attempt for it.
    ///
    /// `Ok(None)` means the queue is empty; it is not an error.
    async fn dequeue_rollout(
        &self,
        worker_id: Option<&str>,
    ) -> Result<Option<AttemptedRollout>, ClientError>;

    async fn update_attempt(
        &self,
        rollout_id: &RolloutId,
        attempt_id: &AttemptId,
        update: AttemptUpdate,
    ) -> Result<(), ClientError>;

    /// The only way metadata gets merged into a rollout.
    async fn update_rollout(
        &self,
        rollout_id: &RolloutId,
        update: RolloutUpdate,
    ) -> Result<(), ClientError>;

    async fn query_rollouts(&self, query: &RolloutQuery) -> Result<RolloutPage, ClientError>;

    /// Current resource bundle, if the server has one.
    async fn get_latest_resources(&self) -> Result<Option<Resources>, ClientError>;

    /// Move a freshly enqueued rollout straight to `running`.
    async fn start_rollout(&self, rollout_id: &RolloutId) -> Result<(), ClientError>;

    /// Open a new attempt for a rollout outside the dequeue path.
    async fn start_attempt(&self, rollout_id: &RolloutId) -> Result<AttemptId, ClientError>;

    async fn add_span(&self, span: &SpanRecord) -> Result<(), ClientError>;

    /// Forward an OTLP/JSON `ExportTraceServiceRequest`.
    async fn add_otlp_traces(&self, request: &Value) -> Result<(), ClientError>;

    /// Worker heartbeat. Fire-and-forget: the server has no endpoint for it.
    async fn update_worker(&self, worker_id: &str, stats: &HeartbeatStats)
    -> Result<(), ClientError>;

    async fn statistics(&self) -> Result<Statistics, ClientError> {
        let page = self
            .query_rollouts(&RolloutQuery::new().with_limit(1000))
            .await?;
        Ok(Statistics {
            total_rollouts: page.total,
        })
    }
}
