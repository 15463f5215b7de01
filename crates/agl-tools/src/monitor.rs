use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agl_client::{ClientError, QueueApi};
use agl_model::{RolloutId, RolloutQuery, RolloutStatus};

use crate::{error::ToolError, status::count_by_status};

const ACTIVE_SHOWN: usize = 5;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    /// Rollouts fetched per poll.
    pub limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            limit: 100,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.interval_ms == 0 {
            return Err(ToolError::InvalidConfig(
                "interval_ms must be greater than 0".into(),
            ));
        }
        if self.limit == 0 {
            return Err(ToolError::InvalidConfig(
                "limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Queue state observed by one monitor poll.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    /// 1-based poll counter, failed polls included.
    pub iteration: u64,
    pub by_status: Vec<(RolloutStatus, usize)>,
    /// First rollouts of the page that have not failed.
    pub active: Vec<(RolloutId, RolloutStatus)>,
}

pub struct Monitor {
    api: Arc<dyn QueueApi>,
    cfg: MonitorConfig,
}

impl Monitor {
    pub fn new(api: Arc<dyn QueueApi>, cfg: MonitorConfig) -> Result<Self, ToolError> {
        cfg.validate()?;
        Ok(Self { api, cfg })
    }

    pub async fn poll(&self, iteration: u64) -> Result<MonitorSnapshot, ClientError> {
        let page = self
            .api
            .query_rollouts(&RolloutQuery::new().with_limit(self.cfg.limit))
            .await?;

        let active = page
            .items
            .iter()
            .filter(|r| r.status != RolloutStatus::Failed)
            .take(ACTIVE_SHOWN)
            .map(|r| (r.rollout_id.clone(), r.status))
            .collect();

        Ok(MonitorSnapshot {
            iteration,
            by_status: count_by_status(&page.items),
            active,
        })
    }

    /// Poll every interval until cancelled, handing each snapshot to
    /// `on_snapshot`. Failed polls are logged and skipped. Returns the
    /// number of polls made.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_snapshot: F) -> u64
    where
        F: FnMut(&MonitorSnapshot),
    {
        info!(interval_ms = self.cfg.interval_ms, limit = self.cfg.limit, "monitor started");
        let mut iteration = 0;

        while !cancel.is_cancelled() {
            iteration += 1;
            match self.poll(iteration).await {
                Ok(snapshot) => {
                    debug!(iteration, "monitor poll");
                    on_snapshot(&snapshot);
                }
                Err(e) => warn!(iteration, error = %e, "monitor poll failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cfg.interval()) => {}
            }
        }

        info!(polls = iteration, "monitor stopped");
        iteration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agl_client::fake::{FakeQueue, Op};
    use agl_model::RolloutUpdate;
    use serde_json::json;

    #[tokio::test]
    async fn snapshot_hides_failed_rollouts_from_active() {
        let fake = Arc::new(FakeQueue::new());
        let ids: Vec<_> = (0..8).map(|i| fake.push(json!({ "n": i }))).collect();
        fake.start_rollout(&ids[0]).await.unwrap();
        fake.update_rollout(&ids[0], RolloutUpdate::status(RolloutStatus::Failed))
            .await
            .unwrap();
        fake.update_rollout(&ids[1], RolloutUpdate::status(RolloutStatus::Running))
            .await
            .unwrap();

        let monitor = Monitor::new(fake.clone(), MonitorConfig::default()).unwrap();
        let snapshot = monitor.poll(1).await.unwrap();

        assert_eq!(
            snapshot.by_status,
            vec![
                (RolloutStatus::Queuing, 6),
                (RolloutStatus::Running, 1),
                (RolloutStatus::Failed, 1),
            ]
        );
        assert_eq!(snapshot.active.len(), 5);
        assert_eq!(snapshot.active[0], (ids[1].clone(), RolloutStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_after_errors_until_cancelled() {
        let fake = Arc::new(FakeQueue::new());
        fake.fail(Op::Query, 1);
        let monitor = Monitor::new(fake.clone(), MonitorConfig::default()).unwrap();
        let cancel = CancellationToken::new();

        let mut seen = Vec::new();
        let stop = cancel.clone();
        let polls = monitor
            .run(cancel, |snapshot| {
                seen.push(snapshot.iteration);
                if seen.len() == 2 {
                    stop.cancel();
                }
            })
            .await;

        assert_eq!(polls, 3);
        assert_eq!(seen, vec![2, 3]);
        assert_eq!(fake.count(Op::Query), 3);
    }

    #[test]
    fn rejects_zero_interval() {
        let cfg = MonitorConfig {
            interval_ms: 0,
            ..MonitorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ToolError::InvalidConfig(_))));
    }
}
