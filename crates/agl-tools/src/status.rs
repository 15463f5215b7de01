use tracing::{info, warn};

use agl_client::{ClientError, QueueApi};
use agl_model::{Health, Rollout, RolloutPage, RolloutQuery, RolloutStatus};

/// `true` when the server answers and reports `ok`.
pub async fn check_health(api: &dyn QueueApi) -> bool {
    match api.health().await {
        Ok(health) if health.is_ok() => {
            info!("queue server is healthy");
            true
        }
        Ok(health) => {
            warn!(status = %health.status, "queue server reported unhealthy");
            false
        }
        Err(e) => {
            warn!(error = %e, "queue server is not reachable");
            false
        }
    }
}

pub async fn recent_rollouts(api: &dyn QueueApi, limit: usize) -> Result<RolloutPage, ClientError> {
    api.query_rollouts(&RolloutQuery::new().with_limit(limit))
        .await
}

/// Non-zero counts per status, in lifecycle order.
pub fn count_by_status<'a>(
    rollouts: impl IntoIterator<Item = &'a Rollout>,
) -> Vec<(RolloutStatus, usize)> {
    let mut counts = [0usize; RolloutStatus::ALL.len()];
    for rollout in rollouts {
        if let Some(i) = RolloutStatus::ALL.iter().position(|s| *s == rollout.status) {
            counts[i] += 1;
        }
    }
    RolloutStatus::ALL
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(s, n)| (*s, n))
        .collect()
}

/// Queue overview printed by `agl status`.
#[derive(Debug, Clone)]
pub struct StatusSummary {
    /// `None` if the health probe itself failed.
    pub health: Option<Health>,
    /// Rollouts the server reports in total, which may exceed `limit`.
    pub total: usize,
    pub by_status: Vec<(RolloutStatus, usize)>,
    pub recent: Vec<Rollout>,
}

const RECENT: usize = 10;

/// Health plus the status breakdown of the first `limit` rollouts.
///
/// A failing health probe is recorded, not returned; a failing query is.
pub async fn status_summary(api: &dyn QueueApi, limit: usize) -> Result<StatusSummary, ClientError> {
    let health = match api.health().await {
        Ok(h) => Some(h),
        Err(e) => {
            warn!(error = %e, "health probe failed");
            None
        }
    };

    let page = recent_rollouts(api, limit).await?;
    Ok(StatusSummary {
        health,
        total: page.total,
        by_status: count_by_status(&page.items),
        recent: page.items.into_iter().take(RECENT).collect(),
    })
}
