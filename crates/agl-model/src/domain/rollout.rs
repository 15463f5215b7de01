use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AttemptId, AttemptStatus, ModelError, RolloutId, RolloutStatus};

/// Free-form metadata attached to rollouts and attempts.
pub type Metadata = serde_json::Map<String, Value>;

/// Dataset split a rollout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutMode {
    #[default]
    Train,
    Val,
    Test,
}

impl RolloutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RolloutMode::Train => "train",
            RolloutMode::Val => "val",
            RolloutMode::Test => "test",
        }
    }
}

impl fmt::Display for RolloutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolloutMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(RolloutMode::Train),
            "val" => Ok(RolloutMode::Val),
            "test" => Ok(RolloutMode::Test),
            _ => Err(ModelError::UnknownMode(s.to_string())),
        }
    }
}

/// Retry policy hints for the server. Not enforced client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RolloutConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl RolloutConfig {
    pub fn new(max_attempts: u32, timeout_seconds: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            timeout_seconds: Some(timeout_seconds),
        }
    }
}

/// One unit of submitted work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    pub rollout_id: RolloutId,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RolloutMode>,
    #[serde(default)]
    pub status: RolloutStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RolloutConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_id: Option<String>,
    /// Seconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl Rollout {
    /// Look up a value in the rollout metadata by top-level key.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Wall-clock duration in milliseconds, as reported by the worker
    /// (`execution_time_ms`) or derived from the server timestamps.
    pub fn execution_time_ms(&self) -> Option<f64> {
        if let Some(ms) = self.metadata_value("execution_time_ms").and_then(Value::as_f64) {
            return Some(ms);
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end >= start => Some((end - start) * 1000.0),
            _ => None,
        }
    }
}

/// One execution try of a rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_id: AttemptId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_id: Option<RolloutId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<u32>,
    #[serde(default)]
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

/// Result of a successful dequeue: the claimed rollout plus its fresh attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptedRollout {
    #[serde(flatten)]
    pub rollout: Rollout,
    pub attempt: Attempt,
}

impl AttemptedRollout {
    pub fn rollout_id(&self) -> &RolloutId {
        &self.rollout.rollout_id
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt.attempt_id
    }
}

/// Merge `patch` into `base` at the top level; keys in `patch` win.
///
/// Nested objects are replaced, not merged recursively, matching how the
/// queue server folds successive `update_rollout` metadata writes.
pub fn merge_metadata(base: Option<&Metadata>, patch: Metadata) -> Metadata {
    let mut out = base.cloned().unwrap_or_default();
    out.extend(patch);
    out
}
