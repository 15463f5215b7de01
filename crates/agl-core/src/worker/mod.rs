mod config;
pub use config::{DEFAULT_WORKER_ID, WorkerConfig};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use agl_client::QueueApi;
use agl_model::{
    AttemptId, AttemptStatus, AttemptUpdate, AttemptedRollout, Health, HeartbeatStats, Metadata,
    RolloutId, RolloutStatus, RolloutUpdate,
};

use crate::{
    error::CoreError,
    events::{EventKind, Subscribe, WorkerEvent},
    executor::TaskExecutor,
    metrics::{MetricsHandle, TaskOutcome, noop_metrics},
    system,
};

/// Result of one worker iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Iteration {
    /// The queue had no work.
    Idle,
    /// The executor succeeded and the outcome was reported.
    Completed {
        rollout_id: RolloutId,
        attempt_id: AttemptId,
        execution_time_ms: u64,
    },
    /// The executor failed and the failure was reported.
    Failed {
        rollout_id: RolloutId,
        attempt_id: AttemptId,
        error: String,
    },
}

/// Counters at the time the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    pub tasks_processed: u64,
    pub tasks_failed: u64,
}

/// Single-rollout-at-a-time worker.
pub struct Worker {
    api: Arc<dyn QueueApi>,
    executor: Arc<dyn TaskExecutor>,
    cfg: WorkerConfig,
    metrics: MetricsHandle,
    subscribers: Vec<Arc<dyn Subscribe>>,
    summary: WorkerSummary,
}

impl Worker {
    pub fn new(
        api: Arc<dyn QueueApi>,
        executor: Arc<dyn TaskExecutor>,
        cfg: WorkerConfig,
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        Ok(Self {
            api,
            executor,
            cfg,
            metrics: noop_metrics(),
            subscribers: Vec::new(),
            summary: WorkerSummary::default(),
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.cfg.worker_id
    }

    pub fn summary(&self) -> WorkerSummary {
        self.summary
    }

    /// Check that the queue server answers with `ok` before doing any work.
    pub async fn preflight(&self) -> Result<Health, CoreError> {
        let health = self
            .api
            .health()
            .await
            .map_err(CoreError::transport("health"))?;
        if !health.is_ok() {
            return Err(CoreError::Unhealthy(health.status));
        }
        Ok(health)
    }

    /// Run iterations until `cancel` fires.
    ///
    /// Cancellation interrupts the waits between iterations; an iteration that
    /// already claimed a rollout is allowed to settle it first.
    pub async fn run(&mut self, cancel: CancellationToken) -> WorkerSummary {
        system::init_uptime();
        info!(
            worker_id = %self.cfg.worker_id,
            executor = self.executor.name(),
            host = system::host_name().as_deref().unwrap_or("unknown"),
            platform = system::platform(),
            arch = system::arch(),
            "worker started"
        );
        self.publish(WorkerEvent::new(EventKind::WorkerStarted, &self.cfg.worker_id))
            .await;

        while !cancel.is_cancelled() {
            let pause = match self.step().await {
                Ok(Iteration::Idle) => Some(self.cfg.poll_interval()),
                Ok(_) => None,
                Err(err) => {
                    self.on_transport_error(&err).await;
                    Some(self.cfg.error_backoff())
                }
            };

            self.heartbeat().await;

            if let Some(pause) = pause {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(
            worker_id = %self.cfg.worker_id,
            tasks_processed = self.summary.tasks_processed,
            tasks_failed = self.summary.tasks_failed,
            "worker stopped"
        );
        let stopped = WorkerEvent::new(EventKind::WorkerStopped, &self.cfg.worker_id);
        self.publish(stopped).await;
        self.summary
    }

    /// One iteration: dequeue, execute, settle.
    ///
    /// An `Err` is a transport failure talking to the queue server. Executor
    /// failures are not errors here; they come back as [`Iteration::Failed`].
    pub async fn step(&mut self) -> Result<Iteration, CoreError> {
        let claimed = self
            .api
            .dequeue_rollout(Some(&self.cfg.worker_id))
            .await
            .map_err(CoreError::transport("dequeue_rollout"))?;

        match claimed {
            Some(claimed) => self.process(claimed).await,
            None => {
                debug!(worker_id = %self.cfg.worker_id, "queue empty");
                self.metrics.record_empty_poll();
                self.publish(WorkerEvent::new(EventKind::QueueEmpty, &self.cfg.worker_id))
                    .await;
                Ok(Iteration::Idle)
            }
        }
    }

    #[instrument(
        level = "debug",
        skip(self, claimed),
        fields(rollout_id = %claimed.rollout_id(), attempt_id = %claimed.attempt_id())
    )]
    async fn process(&mut self, claimed: AttemptedRollout) -> Result<Iteration, CoreError> {
        let rollout_id = claimed.rollout_id().clone();
        let attempt_id = claimed.attempt_id().clone();

        info!("claimed rollout");
        self.metrics.record_rollout_claimed();
        self.publish(
            WorkerEvent::new(EventKind::RolloutClaimed, &self.cfg.worker_id)
                .with_rollout(&rollout_id, &attempt_id),
        )
        .await;

        let started = Instant::now();
        let result = self.executor.execute(&claimed.rollout.input).await;
        let elapsed = started.elapsed();
        let execution_time_ms = whole_millis(elapsed);

        match result {
            Ok(output) => {
                self.settle(
                    &rollout_id,
                    &attempt_id,
                    AttemptStatus::Succeeded,
                    success_metadata(output, execution_time_ms),
                )
                .await?;

                self.summary.tasks_processed += 1;
                self.metrics
                    .record_rollout_completed(TaskOutcome::Succeeded, elapsed);
                info!(execution_time_ms, "rollout succeeded");
                self.publish(
                    WorkerEvent::new(EventKind::TaskSucceeded, &self.cfg.worker_id)
                        .with_rollout(&rollout_id, &attempt_id)
                        .with_duration_ms(execution_time_ms),
                )
                .await;

                Ok(Iteration::Completed {
                    rollout_id,
                    attempt_id,
                    execution_time_ms,
                })
            }
            Err(err) => {
                let error = err.to_string();
                self.summary.tasks_failed += 1;
                self.metrics
                    .record_rollout_completed(TaskOutcome::Failed, elapsed);
                warn!(error = %error, "task execution failed");

                self.settle(
                    &rollout_id,
                    &attempt_id,
                    AttemptStatus::Failed,
                    failure_metadata(&error),
                )
                .await?;

                self.publish(
                    WorkerEvent::new(EventKind::TaskFailed, &self.cfg.worker_id)
                        .with_rollout(&rollout_id, &attempt_id)
                        .with_reason(error.clone()),
                )
                .await;

                Ok(Iteration::Failed {
                    rollout_id,
                    attempt_id,
                    error,
                })
            }
        }
    }

    /// Report the attempt, then the rollout, with the same terminal status.
    async fn settle(
        &self,
        rollout_id: &RolloutId,
        attempt_id: &AttemptId,
        status: AttemptStatus,
        metadata: Metadata,
    ) -> Result<(), CoreError> {
        self.api
            .update_attempt(rollout_id, attempt_id, AttemptUpdate::status(status))
            .await
            .map_err(CoreError::transport("update_attempt"))?;

        let update =
            RolloutUpdate::status(RolloutStatus::from_attempt(status)).with_metadata(metadata);
        self.api
            .update_rollout(rollout_id, update)
            .await
            .map_err(CoreError::transport("update_rollout"))
    }

    async fn on_transport_error(&self, err: &CoreError) {
        let operation = err.operation().unwrap_or("unknown");
        warn!(
            worker_id = %self.cfg.worker_id,
            operation,
            error = %err,
            backoff_ms = self.cfg.error_backoff_ms,
            "queue call failed; backing off"
        );
        self.metrics.record_transport_error(operation);
        self.publish(
            WorkerEvent::new(EventKind::TransportFailed, &self.cfg.worker_id)
                .with_operation(operation)
                .with_reason(err.to_string()),
        )
        .await;
    }

    /// Fire-and-forget heartbeat; failures are logged only.
    async fn heartbeat(&self) {
        let stats = heartbeat_stats(self.summary);
        if let Err(err) = self.api.update_worker(&self.cfg.worker_id, &stats).await {
            warn!(worker_id = %self.cfg.worker_id, error = %err, "heartbeat failed");
            self.metrics.record_heartbeat_failure();
            self.publish(
                WorkerEvent::new(EventKind::HeartbeatFailed, &self.cfg.worker_id)
                    .with_reason(err.to_string()),
            )
            .await;
        }
    }

    async fn publish(&self, event: WorkerEvent) {
        for subscriber in &self.subscribers {
            subscriber.on_event(&event).await;
        }
    }
}

fn heartbeat_stats(summary: WorkerSummary) -> HeartbeatStats {
    HeartbeatStats {
        memory_usage: system::memory_usage_mb(),
        uptime: system::uptime_seconds(),
        tasks_processed: summary.tasks_processed,
        tasks_failed: summary.tasks_failed,
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn success_metadata(result: Value, execution_time_ms: u64) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("result".into(), result);
    metadata.insert("execution_time_ms".into(), json!(execution_time_ms));
    metadata.insert("success".into(), Value::Bool(true));
    metadata
}

fn failure_metadata(error: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("error".into(), Value::String(error.to_string()));
    metadata.insert("success".into(), Value::Bool(false));
    metadata
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("worker_id", &self.cfg.worker_id)
            .field("executor", &self.executor.name())
            .field("summary", &self.summary)
            .finish()
    }
}
