use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use agl_core::{ExecError, TaskExecutor};

use crate::dataset::Post;

/// Structured result of analysing one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAnalysis {
    #[serde(default)]
    pub post_id: String,
    pub primary_category: String,
    pub sentiment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Prompt handed to the analysis model for `post`.
pub fn analysis_prompt(post: &Post) -> String {
    format!(
        "Analyze this post:\n\nAuthor: {}\nContent: {}\nPosted at: {}\n\nProvide metadata as JSON.",
        post.author, post.content, post.timestamp
    )
}

/// Adapts a generic executor to `post_analysis` rollouts.
///
/// The inner executor receives `{post, prompt}` and must answer with an
/// object carrying at least `primary_category` and `sentiment`. The
/// returned result always has `post_id` set to the analysed post.
pub struct PostAnalysisExecutor {
    inner: Arc<dyn TaskExecutor>,
}

impl PostAnalysisExecutor {
    pub fn new(inner: Arc<dyn TaskExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TaskExecutor for PostAnalysisExecutor {
    fn name(&self) -> &str {
        "post_analysis"
    }

    async fn execute(&self, input: &Value) -> Result<Value, ExecError> {
        let post = input
            .get("post")
            .ok_or_else(|| ExecError::InvalidInput("missing post".into()))?;
        let post: Post = serde_json::from_value(post.clone())
            .map_err(|e| ExecError::InvalidInput(format!("malformed post: {e}")))?;

        debug!(post_id = %post.id, executor = self.inner.name(), "analysing post");
        let request = json!({
            "post": post,
            "prompt": analysis_prompt(&post),
        });
        let output = self.inner.execute(&request).await?;

        let mut analysis: PostAnalysis = serde_json::from_value(output)?;
        analysis.post_id = post.id;
        Ok(serde_json::to_value(analysis)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_posts;
    use agl_exec::FnExecutor;

    fn input() -> Value {
        json!({"task_type": "post_analysis", "post": test_posts()[0]})
    }

    #[tokio::test]
    async fn forces_post_id_and_keeps_extra_fields() {
        let inner = FnExecutor::new("model", |req| async move {
            assert!(req["prompt"].as_str().unwrap().contains("Author: techfounder"));
            Ok(json!({
                "post_id": "hallucinated",
                "primary_category": "technology",
                "sentiment": "positive",
                "tone": "excited",
                "confidence": 0.9
            }))
        });
        let exec = PostAnalysisExecutor::new(Arc::new(inner));

        let out = exec.execute(&input()).await.unwrap();

        assert_eq!(out["post_id"], json!("test-tech-1"));
        assert_eq!(out["primary_category"], json!("technology"));
        assert_eq!(out["tone"], json!("excited"));
        assert_eq!(out["confidence"], json!(0.9));
        assert!(out.get("complexity").is_none());
    }

    #[tokio::test]
    async fn missing_post_is_invalid_input() {
        let inner = FnExecutor::new("model", |_| async { Ok(json!({})) });
        let exec = PostAnalysisExecutor::new(Arc::new(inner));

        let err = exec.execute(&json!({"task_type": "post_analysis"})).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidInput(_)));

        let err = exec.execute(&json!({"post": {"id": 1}})).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidInput(m) if m.starts_with("malformed post")));
    }

    #[tokio::test]
    async fn result_without_sentiment_is_invalid_output() {
        let inner = FnExecutor::new("model", |_| async {
            Ok(json!({"primary_category": "general"}))
        });
        let exec = PostAnalysisExecutor::new(Arc::new(inner));

        let err = exec.execute(&input()).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidOutput(m) if m.contains("sentiment")));
    }

    #[tokio::test]
    async fn inner_failure_passes_through() {
        let inner = FnExecutor::new("model", |_| async {
            Err(ExecError::Failed("model unavailable".into()))
        });
        let exec = PostAnalysisExecutor::new(Arc::new(inner));

        let err = exec.execute(&input()).await.unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
    }
}
