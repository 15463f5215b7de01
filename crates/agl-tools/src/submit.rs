use serde_json::{Value, json};
use tracing::{info, warn};

use agl_client::QueueApi;
use agl_model::{EnqueueRequest, RolloutConfig, RolloutId, RolloutMode};

use crate::dataset::Post;

/// `task_type` of rollouts produced by [`submit_posts`].
pub const POST_ANALYSIS_TASK: &str = "post_analysis";

const MAX_ATTEMPTS: u32 = 3;
const TIMEOUT_SECONDS: u64 = 60;

/// Retry policy for post-analysis rollouts.
pub fn post_analysis_config() -> RolloutConfig {
    RolloutConfig::new(MAX_ATTEMPTS, TIMEOUT_SECONDS)
}

pub fn post_analysis_input(post: &Post) -> Value {
    json!({
        "task_type": POST_ANALYSIS_TASK,
        "post": post,
    })
}

/// Result of one submission run, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitReport {
    /// `(post id, rollout id)` for every enqueued post.
    pub enqueued: Vec<(String, RolloutId)>,
    /// `(post id, error)` for every post the server refused.
    pub failed: Vec<(String, String)>,
}

impl SubmitReport {
    pub fn rollout_ids(&self) -> Vec<RolloutId> {
        self.enqueued.iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn attempted(&self) -> usize {
        self.enqueued.len() + self.failed.len()
    }
}

/// Enqueue one rollout per post. A failed post is recorded and the rest are
/// still submitted.
pub async fn submit_posts(
    api: &dyn QueueApi,
    posts: &[Post],
    mode: RolloutMode,
    config: RolloutConfig,
) -> SubmitReport {
    let mut report = SubmitReport::default();

    for post in posts {
        let request = EnqueueRequest::new(post_analysis_input(post), mode).with_config(config);
        match api.enqueue_rollout(request).await {
            Ok(rollout) => {
                info!(post_id = %post.id, rollout_id = %rollout.rollout_id, "enqueued post");
                report.enqueued.push((post.id.clone(), rollout.rollout_id));
            }
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "failed to enqueue post");
                report.failed.push((post.id.clone(), e.to_string()));
            }
        }
    }

    info!(
        enqueued = report.enqueued.len(),
        total = posts.len(),
        "submission finished"
    );
    report
}
