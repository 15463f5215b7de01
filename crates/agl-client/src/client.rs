use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, trace};

use agl_model::{
    AttemptId, AttemptUpdate, AttemptedRollout, EnqueueRequest, Health, HeartbeatStats,
    Resources, Rollout, RolloutId, RolloutPage, RolloutQuery, RolloutUpdate, SpanRecord,
};

use crate::{api::QueueApi, config::ClientConfig, errors::ClientError};

/// HTTP client for the queue server.
#[derive(Clone, Debug)]
pub struct QueueClient {
    http: reqwest::Client,
    endpoint: String,
}

impl QueueClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        cfg.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Send the request and return the body of a 2xx response.
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        trace!(path, status = status.as_u16(), "queue server responded");
        Ok(body)
    }

    async fn get_value(&self, path: &str) -> Result<Value, ClientError> {
        let body = self.send(path, self.http.get(self.url(path))).await?;
        parse_body(path, &body)
    }

    async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self
            .send(path, self.http.post(self.url(path)).json(payload))
            .await?;
        parse_body(path, &body)
    }

    async fn post_unit<B>(&self, path: &str, payload: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(path, self.http.post(self.url(path)).json(payload))
            .await
            .map(|_| ())
    }
}

fn parse_body<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ClientError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ClientError::InvalidResponse {
        path: path.to_string(),
        reason: format!("failed to parse response: {}, body: {}", e, body),
    })
}

fn from_value<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse {
        path: path.to_string(),
        reason: format!("unexpected payload shape: {}", e),
    })
}

/// Empty body, `null` and `{}` all mean "nothing there".
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl QueueApi for QueueClient {
    async fn health(&self) -> Result<Health, ClientError> {
        let value = self.get_value("/health").await?;
        from_value("/health", value)
    }

    async fn enqueue_rollout(&self, request: EnqueueRequest) -> Result<Rollout, ClientError> {
        debug!(mode = %request.mode, "enqueueing rollout");
        self.post_json("/enqueue_rollout", &request).await
    }

    async fn dequeue_rollout(
        &self,
        worker_id: Option<&str>,
    ) -> Result<Option<AttemptedRollout>, ClientError> {
        const PATH: &str = "/dequeue_rollout";

        let url = match worker_id {
            Some(id) => Url::parse_with_params(&self.url(PATH), &[("worker_id", id)]),
            None => Url::parse(&self.url(PATH)),
        }
        .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))?;

        let body = self.send(PATH, self.http.get(url)).await?;
        let value: Value = parse_body(PATH, &body)?;
        if is_empty_payload(&value) {
            return Ok(None);
        }
        from_value(PATH, value).map(Some)
    }

    async fn update_attempt(
        &self,
        rollout_id: &RolloutId,
        attempt_id: &AttemptId,
        update: AttemptUpdate,
    ) -> Result<(), ClientError> {
        let payload = json!({
            "rollout_id": rollout_id,
            "attempt_id": attempt_id,
            "status": update.status,
            "metadata": update.metadata,
        });
        self.post_unit("/update_attempt", &strip_nulls(payload)).await
    }

    async fn update_rollout(
        &self,
        rollout_id: &RolloutId,
        update: RolloutUpdate,
    ) -> Result<(), ClientError> {
        let payload = json!({
            "rollout_id": rollout_id,
            "status": update.status,
            "metadata": update.metadata,
        });
        self.post_unit("/update_rollout", &strip_nulls(payload)).await
    }

    async fn query_rollouts(&self, query: &RolloutQuery) -> Result<RolloutPage, ClientError> {
        self.post_json("/query_rollouts", query).await
    }

    async fn get_latest_resources(&self) -> Result<Option<Resources>, ClientError> {
        const PATH: &str = "/get_latest_resources";

        let value = self.get_value(PATH).await?;
        if is_empty_payload(&value) {
            return Ok(None);
        }
        from_value(PATH, value).map(Some)
    }

    async fn start_rollout(&self, rollout_id: &RolloutId) -> Result<(), ClientError> {
        self.post_unit("/start_rollout", &json!({ "rollout_id": rollout_id }))
            .await
    }

    async fn start_attempt(&self, rollout_id: &RolloutId) -> Result<AttemptId, ClientError> {
        const PATH: &str = "/start_attempt";

        let value: Value = self
            .post_json(PATH, &json!({ "rollout_id": rollout_id }))
            .await?;
        let attempt_id = value
            .get("attempt_id")
            .or_else(|| value.get("attempt").and_then(|a| a.get("attempt_id")))
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::InvalidResponse {
                path: PATH.to_string(),
                reason: format!("missing attempt_id in {}", value),
            })?;
        Ok(AttemptId::from(attempt_id))
    }

    async fn add_span(&self, span: &SpanRecord) -> Result<(), ClientError> {
        self.post_unit("/add_span", span).await
    }

    async fn add_otlp_traces(&self, request: &Value) -> Result<(), ClientError> {
        self.post_unit("/v1/traces", request).await
    }

    async fn update_worker(
        &self,
        worker_id: &str,
        stats: &HeartbeatStats,
    ) -> Result<(), ClientError> {
        // No heartbeat endpoint exists server-side; workers are tracked through attempts.
        debug!(
            worker_id,
            memory_usage_mb = stats.memory_usage,
            uptime = stats.uptime,
            tasks_processed = stats.tasks_processed,
            tasks_failed = stats.tasks_failed,
            "worker heartbeat"
        );
        Ok(())
    }
}

fn strip_nulls(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payloads() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!({"rollout_id": "x"})));
    }

    #[test]
    fn parse_body_treats_blank_as_null() {
        let v: Value = parse_body("/x", "  ").unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn parse_body_reports_path_and_body() {
        let err = parse_body::<Health>("/health", "<html>").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/health"));
        assert!(msg.contains("<html>"));
    }

    #[test]
    fn strip_nulls_drops_unset_fields() {
        let v = strip_nulls(json!({"rollout_id": "r", "status": null, "metadata": null}));
        assert_eq!(v, json!({"rollout_id": "r"}));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let client = QueueClient::new(&ClientConfig::new("http://localhost:4747/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4747");
        assert_eq!(client.url("/health"), "http://localhost:4747/health");
    }
}
