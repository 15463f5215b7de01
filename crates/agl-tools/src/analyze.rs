use std::collections::BTreeMap;

use serde_json::Value;

use agl_client::QueueApi;
use agl_model::{Rollout, RolloutQuery, RolloutStatus};

use crate::{QUERY_LIMIT, error::ToolError};

/// Succeeded rollouts needed before the dataset is worth training on.
const TRAINING_MINIMUM: usize = 500;
const EARLY_STAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub samples: usize,
}

impl TimeStats {
    /// Only strictly positive durations count.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let samples: Vec<f64> = samples.into_iter().filter(|ms| *ms > 0.0).collect();
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().sum();
        Some(Self {
            avg_ms: sum / samples.len() as f64,
            min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            samples: samples.len(),
        })
    }
}

/// How far data collection has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NeedMoreData,
    Collecting,
    ReadyForTraining,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub execution_time: Option<TimeStats>,
    /// `primary_category` of succeeded results, most frequent first.
    pub categories: Vec<(String, usize)>,
}

impl Analysis {
    pub fn from_rollouts(rollouts: &[Rollout]) -> Self {
        let succeeded: Vec<&Rollout> = rollouts
            .iter()
            .filter(|r| r.status == RolloutStatus::Succeeded)
            .collect();
        let failed = rollouts
            .iter()
            .filter(|r| r.status == RolloutStatus::Failed)
            .count();

        let execution_time =
            TimeStats::from_samples(succeeded.iter().filter_map(|r| r.execution_time_ms()));

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in &succeeded {
            let category = r
                .metadata_value("result")
                .and_then(|res| res.get("primary_category"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *counts.entry(category.to_string()).or_default() += 1;
        }
        let mut categories: Vec<(String, usize)> = counts.into_iter().collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total: rollouts.len(),
            succeeded: succeeded.len(),
            failed,
            execution_time,
            categories,
        }
    }

    /// Succeeded share in percent; `None` for an empty queue.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.succeeded as f64 * 100.0 / self.total as f64)
    }

    pub fn readiness(&self) -> Readiness {
        match self.succeeded {
            n if n < EARLY_STAGE => Readiness::NeedMoreData,
            n if n < TRAINING_MINIMUM => Readiness::Collecting,
            _ => Readiness::ReadyForTraining,
        }
    }

    pub fn training_minimum() -> usize {
        TRAINING_MINIMUM
    }
}

/// Summarise up to [`QUERY_LIMIT`] rollouts.
pub async fn analyze(api: &dyn QueueApi) -> Result<Analysis, ToolError> {
    let page = api
        .query_rollouts(&RolloutQuery::new().with_limit(QUERY_LIMIT))
        .await?;
    Ok(Analysis::from_rollouts(&page.items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agl_client::fake::FakeQueue;
    use agl_model::Metadata;
    use serde_json::json;

    fn rollout(status: RolloutStatus, metadata: Option<Value>) -> Rollout {
        Rollout {
            rollout_id: "ro".into(),
            input: Value::Null,
            mode: None,
            status,
            metadata: metadata.and_then(|m| serde_json::from_value::<Metadata>(m).ok()),
            config: None,
            resources_id: None,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn time_stats_ignore_non_positive_samples() {
        let stats = TimeStats::from_samples([100.0, 0.0, 300.0, -5.0, 200.0]).unwrap();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.avg_ms, 200.0);
        assert_eq!(stats.min_ms, 100.0);
        assert_eq!(stats.max_ms, 300.0);
        assert!(TimeStats::from_samples([0.0]).is_none());
    }

    #[test]
    fn analysis_of_mixed_rollouts() {
        let mut timed = rollout(
            RolloutStatus::Succeeded,
            Some(json!({"result": {"primary_category": "startups"}})),
        );
        timed.start_time = Some(10.0);
        timed.end_time = Some(10.5);

        let rollouts = vec![
            rollout(
                RolloutStatus::Succeeded,
                Some(json!({"result": {"primary_category": "technology"}, "execution_time_ms": 1500})),
            ),
            rollout(
                RolloutStatus::Succeeded,
                Some(json!({"result": {"primary_category": "technology"}, "execution_time_ms": 2500})),
            ),
            timed,
            rollout(RolloutStatus::Succeeded, None),
            rollout(RolloutStatus::Failed, None),
            rollout(RolloutStatus::Queuing, None),
        ];

        let analysis = Analysis::from_rollouts(&rollouts);

        assert_eq!(analysis.total, 6);
        assert_eq!(analysis.succeeded, 4);
        assert_eq!(analysis.failed, 1);
        let time = analysis.execution_time.unwrap();
        assert_eq!(time.samples, 3);
        assert_eq!(time.min_ms, 500.0);
        assert_eq!(time.max_ms, 2500.0);
        assert_eq!(
            analysis.categories,
            vec![
                ("technology".to_string(), 2),
                ("startups".to_string(), 1),
                ("unknown".to_string(), 1),
            ]
        );
        assert!((analysis.success_rate().unwrap() - 66.666).abs() < 0.01);
        assert_eq!(analysis.readiness(), Readiness::NeedMoreData);
    }

    #[test]
    fn empty_queue_has_no_rate() {
        let analysis = Analysis::from_rollouts(&[]);
        assert_eq!(analysis.success_rate(), None);
        assert_eq!(analysis.execution_time, None);
    }

    #[tokio::test]
    async fn analyze_queries_the_server() {
        let fake = FakeQueue::new();
        fake.push(json!({}));
        let analysis = analyze(&fake).await.unwrap();
        assert_eq!(analysis.total, 1);
        assert_eq!(analysis.succeeded, 0);
    }
}
