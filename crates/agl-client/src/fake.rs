//! In-memory [`QueueApi`] that behaves like a single queue server and records
//! every call it receives.
//!
//! Failures can be injected per operation to exercise retry and best-effort
//! paths of callers.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use agl_model::{
    Attempt, AttemptId, AttemptStatus, AttemptUpdate, AttemptedRollout, EnqueueRequest, Health,
    HeartbeatStats, Metadata, Resources, Rollout, RolloutId, RolloutPage, RolloutQuery,
    RolloutStatus, RolloutUpdate, SpanRecord, merge_metadata,
};

use crate::{api::QueueApi, errors::ClientError};

/// Operation kinds, used to count calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Health,
    Enqueue,
    Dequeue,
    UpdateAttempt,
    UpdateRollout,
    Query,
    Resources,
    StartRollout,
    StartAttempt,
    AddSpan,
    AddOtlp,
    Heartbeat,
}

/// A recorded call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Health,
    Enqueue(EnqueueRequest),
    Dequeue(Option<String>),
    UpdateAttempt(RolloutId, AttemptId, AttemptUpdate),
    UpdateRollout(RolloutId, RolloutUpdate),
    Query(RolloutQuery),
    Resources,
    StartRollout(RolloutId),
    StartAttempt(RolloutId),
    AddSpan(Box<SpanRecord>),
    AddOtlp(Value),
    Heartbeat(String, HeartbeatStats),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::Health => Op::Health,
            Call::Enqueue(_) => Op::Enqueue,
            Call::Dequeue(_) => Op::Dequeue,
            Call::UpdateAttempt(..) => Op::UpdateAttempt,
            Call::UpdateRollout(..) => Op::UpdateRollout,
            Call::Query(_) => Op::Query,
            Call::Resources => Op::Resources,
            Call::StartRollout(_) => Op::StartRollout,
            Call::StartAttempt(_) => Op::StartAttempt,
            Call::AddSpan(_) => Op::AddSpan,
            Call::AddOtlp(_) => Op::AddOtlp,
            Call::Heartbeat(..) => Op::Heartbeat,
        }
    }
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    rollouts: Vec<Rollout>,
    queue: VecDeque<RolloutId>,
    attempts: HashMap<AttemptId, Attempt>,
    calls: Vec<Call>,
    failures: HashMap<Op, usize>,
    health: Option<String>,
    resources: Option<Resources>,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn rollout_mut(&mut self, id: &RolloutId) -> Option<&mut Rollout> {
        self.rollouts.iter_mut().find(|r| &r.rollout_id == id)
    }
}

pub struct FakeQueue {
    state: Mutex<FakeState>,
    latency: Option<Duration>,
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            latency: None,
        }
    }

    /// Delay every call by `latency` so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a rollout as if a producer had enqueued it.
    pub fn push(&self, input: Value) -> RolloutId {
        let mut st = self.lock();
        let id = RolloutId::from(st.next("ro"));
        st.rollouts.push(new_rollout(id.clone(), input));
        st.queue.push_back(id.clone());
        id
    }

    /// Store a rollout as-is; it is not queued for dequeue.
    pub fn insert(&self, rollout: Rollout) {
        self.lock().rollouts.push(rollout);
    }

    /// Make the next `times` calls of `op` fail with a 500.
    pub fn fail(&self, op: Op, times: usize) {
        self.lock().failures.insert(op, times);
    }

    pub fn fail_always(&self, op: Op) {
        self.fail(op, usize::MAX);
    }

    pub fn set_health(&self, status: &str) {
        self.lock().health = Some(status.to_string());
    }

    pub fn set_resources(&self, resources: Resources) {
        self.lock().resources = Some(resources);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn rollout(&self, id: &RolloutId) -> Option<Rollout> {
        self.lock()
            .rollouts
            .iter()
            .find(|r| &r.rollout_id == id)
            .cloned()
    }

    pub fn attempt(&self, id: &AttemptId) -> Option<Attempt> {
        self.lock().attempts.get(id).cloned()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::AddSpan(span) => Some(span.as_ref().clone()),
                _ => None,
            })
            .collect()
    }

    /// Record the call and decide whether it fails.
    async fn enter(&self, call: Call) -> Result<(), ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let op = call.op();
        let mut st = self.lock();
        st.calls.push(call);

        match st.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                Err(ClientError::Status {
                    path: format!("{:?}", op),
                    status: 500,
                    body: "injected failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn new_rollout(rollout_id: RolloutId, input: Value) -> Rollout {
    Rollout {
        rollout_id,
        input,
        mode: None,
        status: RolloutStatus::Queuing,
        metadata: None,
        config: None,
        resources_id: None,
        start_time: None,
        end_time: None,
    }
}

fn not_found(what: &str, id: &str) -> ClientError {
    ClientError::Status {
        path: what.to_string(),
        status: 404,
        body: format!("unknown id {}", id),
    }
}

fn conflict(what: &str, reason: String) -> ClientError {
    ClientError::Status {
        path: what.to_string(),
        status: 409,
        body: reason,
    }
}

/// Move a rollout to `next`, refusing transitions the state machine forbids.
fn transition_rollout(rollout: &mut Rollout, next: RolloutStatus) -> Result<(), ClientError> {
    if !rollout.status.can_transition_to(next) {
        return Err(conflict(
            "rollout",
            format!(
                "rollout {} cannot go from {} to {}",
                rollout.rollout_id, rollout.status, next
            ),
        ));
    }
    rollout.status = next;
    Ok(())
}

#[async_trait]
impl QueueApi for FakeQueue {
    async fn health(&self) -> Result<Health, ClientError> {
        self.enter(Call::Health).await?;
        let status = self.lock().health.clone().unwrap_or_else(|| "ok".to_string());
        Ok(Health {
            status,
            extra: Metadata::new(),
        })
    }

    async fn enqueue_rollout(&self, request: EnqueueRequest) -> Result<Rollout, ClientError> {
        self.enter(Call::Enqueue(request.clone())).await?;
        let mut st = self.lock();
        let id = RolloutId::from(st.next("ro"));
        let mut rollout = new_rollout(id.clone(), request.input);
        rollout.mode = Some(request.mode);
        rollout.config = request.config;
        rollout.resources_id = request.resources_id;
        st.rollouts.push(rollout.clone());
        st.queue.push_back(id);
        Ok(rollout)
    }

    async fn dequeue_rollout(
        &self,
        worker_id: Option<&str>,
    ) -> Result<Option<AttemptedRollout>, ClientError> {
        self.enter(Call::Dequeue(worker_id.map(str::to_string))).await?;
        let mut st = self.lock();
        let Some(id) = st.queue.pop_front() else {
            return Ok(None);
        };
        let attempt = Attempt {
            attempt_id: AttemptId::from(st.next("at")),
            rollout_id: Some(id.clone()),
            sequence_id: Some(1),
            status: AttemptStatus::Preparing,
            worker_id: worker_id.map(str::to_string),
            start_time: None,
            end_time: None,
        };
        st.attempts.insert(attempt.attempt_id.clone(), attempt.clone());
        let rollout = st.rollout_mut(&id).ok_or_else(|| not_found("rollout", id.as_str()))?;
        transition_rollout(rollout, RolloutStatus::Preparing)?;
        let rollout = rollout.clone();
        Ok(Some(AttemptedRollout { rollout, attempt }))
    }

    async fn update_attempt(
        &self,
        rollout_id: &RolloutId,
        attempt_id: &AttemptId,
        update: AttemptUpdate,
    ) -> Result<(), ClientError> {
        self.enter(Call::UpdateAttempt(
            rollout_id.clone(),
            attempt_id.clone(),
            update.clone(),
        ))
        .await?;
        let mut st = self.lock();
        let attempt = st
            .attempts
            .get_mut(attempt_id)
            .filter(|a| a.rollout_id.as_ref() == Some(rollout_id))
            .ok_or_else(|| not_found("attempt", attempt_id.as_str()))?;
        let Some(status) = update.status else {
            return Ok(());
        };
        if !attempt.status.can_transition_to(status) {
            return Err(conflict(
                "attempt",
                format!(
                    "attempt {} cannot go from {} to {}",
                    attempt_id, attempt.status, status
                ),
            ));
        }
        attempt.status = status;

        // The rollout always shows the status of its latest attempt.
        let rollout = st
            .rollout_mut(rollout_id)
            .ok_or_else(|| not_found("rollout", rollout_id.as_str()))?;
        transition_rollout(rollout, RolloutStatus::from_attempt(status))
    }

    async fn update_rollout(
        &self,
        rollout_id: &RolloutId,
        update: RolloutUpdate,
    ) -> Result<(), ClientError> {
        self.enter(Call::UpdateRollout(rollout_id.clone(), update.clone()))
            .await?;
        let mut st = self.lock();
        let rollout = st
            .rollout_mut(rollout_id)
            .ok_or_else(|| not_found("rollout", rollout_id.as_str()))?;
        if let Some(status) = update.status {
            transition_rollout(rollout, status)?;
        }
        if let Some(patch) = update.metadata {
            rollout.metadata = Some(merge_metadata(rollout.metadata.as_ref(), patch));
        }
        Ok(())
    }

    async fn query_rollouts(&self, query: &RolloutQuery) -> Result<RolloutPage, ClientError> {
        self.enter(Call::Query(query.clone())).await?;
        let st = self.lock();
        let matching: Vec<&Rollout> = st
            .rollouts
            .iter()
            .filter(|r| match &query.status_in {
                Some(statuses) => statuses.contains(&r.status),
                None => true,
            })
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        Ok(RolloutPage { items, total })
    }

    async fn get_latest_resources(&self) -> Result<Option<Resources>, ClientError> {
        self.enter(Call::Resources).await?;
        Ok(self.lock().resources.clone())
    }

    async fn start_rollout(&self, rollout_id: &RolloutId) -> Result<(), ClientError> {
        self.enter(Call::StartRollout(rollout_id.clone())).await?;
        let mut st = self.lock();
        st.queue.retain(|id| id != rollout_id);
        let rollout = st
            .rollout_mut(rollout_id)
            .ok_or_else(|| not_found("rollout", rollout_id.as_str()))?;
        transition_rollout(rollout, RolloutStatus::Running)
    }

    async fn start_attempt(&self, rollout_id: &RolloutId) -> Result<AttemptId, ClientError> {
        self.enter(Call::StartAttempt(rollout_id.clone())).await?;
        let mut st = self.lock();
        let rollout = st
            .rollout_mut(rollout_id)
            .ok_or_else(|| not_found("rollout", rollout_id.as_str()))?;
        if rollout.status.is_terminal() {
            return Err(conflict(
                "attempt",
                format!("rollout {} is already {}", rollout_id, rollout.status),
            ));
        }
        let attempt_id = AttemptId::from(st.next("at"));
        st.attempts.insert(
            attempt_id.clone(),
            Attempt {
                attempt_id: attempt_id.clone(),
                rollout_id: Some(rollout_id.clone()),
                sequence_id: None,
                status: AttemptStatus::Running,
                worker_id: None,
                start_time: None,
                end_time: None,
            },
        );
        Ok(attempt_id)
    }

    async fn add_span(&self, span: &SpanRecord) -> Result<(), ClientError> {
        self.enter(Call::AddSpan(Box::new(span.clone()))).await
    }

    async fn add_otlp_traces(&self, request: &Value) -> Result<(), ClientError> {
        self.enter(Call::AddOtlp(request.clone())).await
    }

    async fn update_worker(
        &self,
        worker_id: &str,
        stats: &HeartbeatStats,
    ) -> Result<(), ClientError> {
        self.enter(Call::Heartbeat(worker_id.to_string(), stats.clone()))
            .await
    }
}
