use serde::{Deserialize, Serialize};

/// Liveness report a worker emits after every loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStats {
    /// Resident memory in megabytes.
    pub memory_usage: f64,
    /// Seconds since the worker process started.
    pub uptime: u64,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    /// RFC 3339 timestamp of the report.
    pub timestamp: String,
}
