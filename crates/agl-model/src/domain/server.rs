use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Metadata;

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Named resource bundle (prompt templates, model pointers, ...) a rollout may be bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub resources_id: Option<String>,
    #[serde(default)]
    pub resources: Value,
    #[serde(flatten)]
    pub extra: Metadata,
}
