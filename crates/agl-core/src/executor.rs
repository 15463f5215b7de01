use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of a task executor. Always settles the attempt as `failed`.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    #[error("{0}")]
    Failed(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("non-zero exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("killed by signal")]
    KilledBySignal,
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ExecError {
    fn from(e: serde_json::Error) -> Self {
        ExecError::InvalidOutput(e.to_string())
    }
}

/// Pluggable unit of work the worker runs for each claimed rollout.
///
/// Receives the rollout `input` and returns the structured result that is
/// stored under `metadata.result`.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn execute(&self, input: &Value) -> Result<Value, ExecError>;
}
