use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown rollout status: {0}")]
    UnknownRolloutStatus(String),
    #[error("unknown attempt status: {0}")]
    UnknownAttemptStatus(String),
    #[error("unknown rollout mode: {0} (expected: train|val|test)")]
    UnknownMode(String),
}
