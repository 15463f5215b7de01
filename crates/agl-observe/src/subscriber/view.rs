use std::borrow::Borrow;

use agl_core::{EventKind, WorkerEvent};
use tracing::{error, info, trace, warn};

pub trait View {
    fn worker(&self) -> &str;
    fn rollout(&self) -> &str;
    fn attempt(&self) -> &str;
    fn operation(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn duration_ms(&self) -> u64;
    fn kind(&self) -> EventKind;
}

impl<T> View for T
where
    T: Borrow<WorkerEvent>,
{
    #[inline]
    fn worker(&self) -> &str {
        &self.borrow().worker_id
    }
    #[inline]
    fn rollout(&self) -> &str {
        self.borrow()
            .rollout_id
            .as_ref()
            .map_or("unknown", |id| id.as_str())
    }
    #[inline]
    fn attempt(&self) -> &str {
        self.borrow()
            .attempt_id
            .as_ref()
            .map_or("unknown", |id| id.as_str())
    }
    #[inline]
    fn operation(&self) -> &str {
        self.borrow().operation.unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn duration_ms(&self) -> u64 {
        self.borrow().duration_ms.unwrap_or(0)
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // lifecycle
        EventKind::WorkerStarted => "worker started",
        EventKind::WorkerStopped => "worker stopped",

        // polling
        EventKind::RolloutClaimed => "claimed rollout",
        EventKind::QueueEmpty => "no rollouts available",

        // outcome
        EventKind::TaskSucceeded => "rollout completed",
        EventKind::TaskFailed => "rollout failed",

        // transport
        EventKind::TransportFailed => "queue request failed; backing off",
        EventKind::HeartbeatFailed => "heartbeat failed",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        EventKind::WorkerStarted | EventKind::WorkerStopped => {
            info!(worker = e.worker(), "{msg}")
        }
        EventKind::RolloutClaimed => {
            info!(rollout = e.rollout(), attempt = e.attempt(), "{msg}")
        }
        EventKind::QueueEmpty => trace!(worker = e.worker(), "{msg}"),
        EventKind::TaskSucceeded => info!(
            rollout = e.rollout(),
            attempt = e.attempt(),
            duration_ms = e.duration_ms(),
            "{msg}"
        ),
        EventKind::TaskFailed => error!(
            rollout = e.rollout(),
            attempt = e.attempt(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::TransportFailed => {
            warn!(operation = e.operation(), reason = e.as_reason(), "{msg}")
        }
        EventKind::HeartbeatFailed => {
            warn!(worker = e.worker(), reason = e.as_reason(), "{msg}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_falls_back_for_missing_fields() {
        let event = WorkerEvent::new(EventKind::TransportFailed, "w1").with_operation("dequeue");
        assert_eq!(event.worker(), "w1");
        assert_eq!(event.operation(), "dequeue");
        assert_eq!(event.rollout(), "unknown");
        assert_eq!(event.as_reason(), "unknown");
        assert_eq!(event.duration_ms(), 0);
    }

    #[test]
    fn claimed_event_carries_ids() {
        let event = WorkerEvent::new(EventKind::RolloutClaimed, "w1")
            .with_rollout(&"ro-1".into(), &"at-1".into());
        assert_eq!((&event).rollout(), "ro-1");
        assert_eq!((&event).attempt(), "at-1");
        assert_eq!(message_for(event.kind()), "claimed rollout");
    }
}
