use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::{ExecError, TaskExecutor};

type BoxFuture = Pin<Box<dyn Future<Output = Result<Value, ExecError>> + Send>>;
type Handler = dyn Fn(Value) -> BoxFuture + Send + Sync;

/// Executor backed by an async closure.
///
/// The closure receives an owned copy of the rollout input.
#[derive(Clone)]
pub struct FnExecutor {
    name: String,
    handler: Arc<Handler>,
}

impl FnExecutor {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |input| Box::pin(f(input))),
        }
    }
}

#[async_trait]
impl TaskExecutor for FnExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: &Value) -> Result<Value, ExecError> {
        trace!(executor = %self.name, "calling function");
        (self.handler)(input.clone()).await
    }
}

impl std::fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}
