use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AttemptStatus, Metadata, RolloutConfig, RolloutMode, RolloutStatus};

/// Body of `POST /enqueue_rollout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub input: Value,
    pub mode: RolloutMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RolloutConfig>,
}

impl EnqueueRequest {
    pub fn new(input: Value, mode: RolloutMode) -> Self {
        Self {
            input,
            mode,
            resources_id: None,
            config: None,
        }
    }

    pub fn with_config(mut self, config: RolloutConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_resources(mut self, resources_id: impl Into<String>) -> Self {
        self.resources_id = Some(resources_id.into());
        self
    }
}

/// Partial update of a rollout. Unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloutUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RolloutStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl RolloutUpdate {
    pub fn status(status: RolloutStatus) -> Self {
        Self {
            status: Some(status),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update of an attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AttemptStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl AttemptUpdate {
    pub fn status(status: AttemptStatus) -> Self {
        Self {
            status: Some(status),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_update_has_no_metadata_key() {
        let json = serde_json::to_value(AttemptUpdate::status(AttemptStatus::Failed)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed"}));
    }

    #[test]
    fn metadata_only_update_has_no_status_key() {
        let mut meta = Metadata::new();
        meta.insert("reward".into(), serde_json::json!(0.5));
        let update = RolloutUpdate {
            metadata: Some(meta),
            ..Default::default()
        };
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json, serde_json::json!({"metadata": {"reward": 0.5}}));
    }
}
