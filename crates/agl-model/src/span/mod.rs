use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AttemptId, RolloutId};

/// Sanitised span attributes, keyed by attribute name.
pub type Attributes = BTreeMap<String, Value>;

/// Outcome code of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpanStatusRecord {
    pub status_code: StatusCode,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEventRecord {
    pub name: String,
    /// Seconds since the unix epoch.
    pub timestamp: f64,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanLinkRecord {
    pub trace_id: String,
    pub span_id: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanContextRecord {
    pub trace_id: String,
    pub span_id: String,
    pub is_remote: bool,
    pub trace_state: BTreeMap<String, String>,
}

impl SpanContextRecord {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, is_remote: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            is_remote,
            trace_state: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub attributes: Attributes,
}

/// A converted span as accepted by `POST /add_span`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub rollout_id: RolloutId,
    pub attempt_id: AttemptId,
    /// 0-based, strictly increasing per rollout.
    pub sequence_id: u64,
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub status: SpanStatusRecord,
    pub attributes: Attributes,
    pub events: Vec<SpanEventRecord>,
    pub links: Vec<SpanLinkRecord>,
    pub start_time: f64,
    pub end_time: f64,
    pub context: SpanContextRecord,
    pub parent: Option<SpanContextRecord>,
    pub resource: ResourceRecord,
}
