use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::{ExecError, TaskExecutor};

/// Picks an executor by the `task_type` field of the rollout input.
///
/// Inputs without a registered `task_type` go to the fallback executor when
/// one is set and fail with [`ExecError::InvalidInput`] otherwise.
#[derive(Default)]
pub struct ExecRouter {
    routes: HashMap<String, Arc<dyn TaskExecutor>>,
    fallback: Option<Arc<dyn TaskExecutor>>,
}

impl ExecRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, task_type: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        self.routes.insert(task_type.into(), executor);
        self
    }

    pub fn fallback(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn pick(&self, input: &Value) -> Result<&Arc<dyn TaskExecutor>, ExecError> {
        let task_type = input.get("task_type").and_then(Value::as_str);
        task_type
            .and_then(|t| self.routes.get(t))
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                ExecError::InvalidInput(format!(
                    "unsupported task_type: {}",
                    task_type.unwrap_or("<missing>")
                ))
            })
    }
}

#[async_trait]
impl TaskExecutor for ExecRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn execute(&self, input: &Value) -> Result<Value, ExecError> {
        let executor = self.pick(input)?;
        trace!(executor = executor.name(), "routed task");
        executor.execute(input).await
    }
}
