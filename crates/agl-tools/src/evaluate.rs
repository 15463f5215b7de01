use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info, warn};

use agl_client::QueueApi;
use agl_model::{
    Metadata, Rollout, RolloutId, RolloutQuery, RolloutStatus, RolloutUpdate, merge_metadata,
};

use crate::{
    QUERY_LIMIT,
    dataset::{Expected, GroundTruth},
    error::ToolError,
};

/// Reward assigned to one classified post.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reward {
    pub value: f64,
    pub category_correct: bool,
    pub sentiment_correct: bool,
}

impl Reward {
    pub fn is_perfect(&self) -> bool {
        self.category_correct && self.sentiment_correct
    }
}

/// `1.0` for category and sentiment, `0.5` for category only, `-1.0` when the
/// category is wrong regardless of sentiment.
pub fn score(expected: &Expected, category: Option<&str>, sentiment: Option<&str>) -> Reward {
    let category_correct = category == Some(expected.category.as_str());
    let sentiment_correct = sentiment == Some(expected.sentiment.as_str());
    let value = match (category_correct, sentiment_correct) {
        (true, true) => 1.0,
        (true, false) => 0.5,
        (false, _) => -1.0,
    };
    Reward {
        value,
        category_correct,
        sentiment_correct,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedRollout {
    pub rollout_id: RolloutId,
    pub post_id: String,
    pub expected: Expected,
    pub category: Option<String>,
    pub sentiment: Option<String>,
    pub reward: Reward,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSummary {
    /// Scored and written back.
    pub rollouts: Vec<EvaluatedRollout>,
    /// Succeeded rollouts without a test post, ground truth or result.
    pub skipped: usize,
    /// Scored, but the metadata update failed.
    pub update_failures: usize,
}

impl EvaluationSummary {
    pub fn evaluated(&self) -> usize {
        self.rollouts.len()
    }

    pub fn perfect(&self) -> usize {
        self.count(|r| r.reward.is_perfect())
    }

    pub fn category_correct(&self) -> usize {
        self.count(|r| r.reward.category_correct)
    }

    pub fn sentiment_correct(&self) -> usize {
        self.count(|r| r.reward.sentiment_correct)
    }

    /// Share of perfect matches in percent; `None` when nothing was evaluated.
    pub fn accuracy(&self) -> Option<f64> {
        self.percent(self.perfect())
    }

    pub fn category_accuracy(&self) -> Option<f64> {
        self.percent(self.category_correct())
    }

    pub fn sentiment_accuracy(&self) -> Option<f64> {
        self.percent(self.sentiment_correct())
    }

    fn count(&self, f: impl Fn(&EvaluatedRollout) -> bool) -> usize {
        self.rollouts.iter().filter(|r| f(r)).count()
    }

    fn percent(&self, n: usize) -> Option<f64> {
        let total = self.evaluated();
        (total > 0).then(|| n as f64 * 100.0 / total as f64)
    }
}

/// Score every succeeded test rollout against `truth` and write the reward
/// into its metadata under `evaluation`.
///
/// The existing metadata is kept; the update carries the merged map. A
/// failed update is counted and evaluation moves on.
pub async fn evaluate(
    api: &dyn QueueApi,
    truth: &GroundTruth,
) -> Result<EvaluationSummary, ToolError> {
    let query = RolloutQuery::new()
        .with_status(RolloutStatus::Succeeded)
        .with_limit(QUERY_LIMIT);
    let page = api.query_rollouts(&query).await?;

    let mut summary = EvaluationSummary::default();
    for rollout in page.with_status(RolloutStatus::Succeeded) {
        let Some(candidate) = scored(rollout, truth) else {
            summary.skipped += 1;
            continue;
        };

        let patch = evaluation_patch(&candidate);
        let update =
            RolloutUpdate::default().with_metadata(merge_metadata(rollout.metadata.as_ref(), patch));

        match api.update_rollout(&rollout.rollout_id, update).await {
            Ok(()) => {
                debug!(
                    rollout_id = %rollout.rollout_id,
                    reward = candidate.reward.value,
                    "rollout evaluated"
                );
                summary.rollouts.push(candidate);
            }
            Err(e) => {
                warn!(rollout_id = %rollout.rollout_id, error = %e, "failed to store evaluation");
                summary.update_failures += 1;
            }
        }
    }

    info!(
        evaluated = summary.evaluated(),
        skipped = summary.skipped,
        failures = summary.update_failures,
        "evaluation finished"
    );
    Ok(summary)
}

fn scored(rollout: &Rollout, truth: &GroundTruth) -> Option<EvaluatedRollout> {
    let post_id = rollout.input.pointer("/post/id")?.as_str()?;
    if !post_id.starts_with("test-") {
        return None;
    }
    let expected = truth.get(post_id)?;
    let result = rollout.metadata_value("result")?.as_object()?;

    let category = result.get("primary_category").and_then(Value::as_str);
    let sentiment = result.get("sentiment").and_then(Value::as_str);
    let reward = score(expected, category, sentiment);

    Some(EvaluatedRollout {
        rollout_id: rollout.rollout_id.clone(),
        post_id: post_id.to_string(),
        expected: expected.clone(),
        category: category.map(str::to_string),
        sentiment: sentiment.map(str::to_string),
        reward,
    })
}

fn evaluation_patch(candidate: &EvaluatedRollout) -> Metadata {
    let evaluated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    let mut patch = Metadata::new();
    patch.insert(
        "evaluation".into(),
        json!({
            "expected": candidate.expected,
            "actual": {
                "category": candidate.category,
                "sentiment": candidate.sentiment,
            },
            "reward": candidate.reward.value,
            "category_correct": candidate.reward.category_correct,
            "sentiment_correct": candidate.reward.sentiment_correct,
            "evaluated_at": evaluated_at,
        }),
    );
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::expected_classifications;
    use agl_client::fake::{Call, FakeQueue, Op};

    fn succeeded(id: &str, post_id: &str, result: Value) -> Rollout {
        let mut metadata = Metadata::new();
        metadata.insert("result".into(), result);
        metadata.insert("execution_time_ms".into(), json!(1200));
        Rollout {
            rollout_id: id.into(),
            input: json!({"task_type": "post_analysis", "post": {"id": post_id}}),
            mode: None,
            status: RolloutStatus::Succeeded,
            metadata: Some(metadata),
            config: None,
            resources_id: None,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn rewards_follow_category_first() {
        let expected = Expected::new("technology", "positive");
        assert_eq!(score(&expected, Some("technology"), Some("positive")).value, 1.0);
        assert_eq!(score(&expected, Some("technology"), Some("neutral")).value, 0.5);
        assert_eq!(score(&expected, Some("startups"), Some("positive")).value, -1.0);
        assert_eq!(score(&expected, None, None).value, -1.0);
    }

    #[tokio::test]
    async fn writes_merged_evaluation_metadata() {
        let fake = FakeQueue::new();
        fake.insert(succeeded(
            "ro-a",
            "test-tech-1",
            json!({"primary_category": "technology", "sentiment": "positive"}),
        ));
        fake.insert(succeeded(
            "ro-b",
            "test-pm-1",
            json!({"primary_category": "product_management", "sentiment": "positive"}),
        ));
        fake.insert(succeeded(
            "ro-c",
            "test-startup-1",
            json!({"primary_category": "general", "sentiment": "positive"}),
        ));

        let summary = evaluate(&fake, &expected_classifications()).await.unwrap();

        assert_eq!(summary.evaluated(), 3);
        assert_eq!(summary.perfect(), 1);
        assert_eq!(summary.category_correct(), 2);
        assert_eq!(summary.sentiment_correct(), 2);
        let rewards: Vec<f64> = summary.rollouts.iter().map(|r| r.reward.value).collect();
        assert_eq!(rewards, vec![1.0, 0.5, -1.0]);

        let stored = fake.rollout(&"ro-b".into()).unwrap();
        let metadata = stored.metadata.unwrap();
        assert_eq!(metadata["execution_time_ms"], json!(1200));
        let evaluation = &metadata["evaluation"];
        assert_eq!(evaluation["reward"], json!(0.5));
        assert_eq!(
            evaluation["expected"],
            json!({"category": "product_management", "sentiment": "neutral"})
        );
        assert_eq!(
            evaluation["actual"],
            json!({"category": "product_management", "sentiment": "positive"})
        );
        assert_eq!(evaluation["sentiment_correct"], json!(false));
        assert!(evaluation["evaluated_at"].as_str().unwrap().starts_with("20"));
        assert_eq!(stored.status, RolloutStatus::Succeeded);
    }

    #[tokio::test]
    async fn skips_rollouts_without_ground_truth_or_result() {
        let fake = FakeQueue::new();
        fake.insert(succeeded("ro-live", "live-42", json!({"primary_category": "general"})));
        fake.insert(succeeded("ro-unknown", "test-unknown", json!({"primary_category": "general"})));
        let mut no_result = succeeded("ro-empty", "test-tech-2", json!(null));
        no_result.metadata = None;
        fake.insert(no_result);
        let mut failed = succeeded("ro-failed", "test-tech-3", json!({"primary_category": "technology"}));
        failed.status = RolloutStatus::Failed;
        fake.insert(failed);

        let summary = evaluate(&fake, &expected_classifications()).await.unwrap();

        assert_eq!(summary.evaluated(), 0);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.accuracy(), None);
        assert_eq!(fake.count(Op::UpdateRollout), 0);
    }

    #[tokio::test]
    async fn update_failures_are_counted_not_fatal() {
        let fake = FakeQueue::new();
        for (id, post) in [("ro-1", "test-tech-1"), ("ro-2", "test-tech-2")] {
            fake.insert(succeeded(
                id,
                post,
                json!({"primary_category": "technology", "sentiment": "positive"}),
            ));
        }
        fake.fail(Op::UpdateRollout, 1);

        let summary = evaluate(&fake, &expected_classifications()).await.unwrap();

        assert_eq!(summary.update_failures, 1);
        assert_eq!(summary.evaluated(), 1);
        assert_eq!(summary.accuracy(), Some(100.0));
        let statuses: Vec<_> = fake
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdateRollout(_, update) => Some(update.status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![None, None]);
    }

    #[tokio::test]
    async fn query_failure_aborts() {
        let fake = FakeQueue::new();
        fake.fail(Op::Query, 1);
        assert!(matches!(
            evaluate(&fake, &expected_classifications()).await,
            Err(ToolError::Client(_))
        ));
    }
}
