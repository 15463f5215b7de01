use std::time::Duration;

use crate::error::CoreError;

pub const DEFAULT_WORKER_ID: &str = "post-analyzer-worker-1";

/// Worker loop settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity reported on dequeue and heartbeat.
    pub worker_id: String,
    /// Wait after an empty poll.
    pub poll_interval_ms: u64,
    /// Wait after a transport error.
    pub error_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID.to_string(),
            poll_interval_ms: 5_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.worker_id.trim().is_empty() {
            return Err(CoreError::InvalidConfig("worker_id is empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.error_backoff_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "error_backoff_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = WorkerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.worker_id, DEFAULT_WORKER_ID);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_empty_id_and_zero_intervals() {
        assert!(WorkerConfig::new("  ").validate().is_err());

        let mut cfg = WorkerConfig::new("w");
        cfg.poll_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = WorkerConfig::new("w");
        cfg.error_backoff_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
