use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Lifecycle state of a rollout.
///
/// ```text
/// queuing → preparing → running → {succeeded | failed | cancelled}
///                          ↓
///                      requeuing → queuing   (next attempt, up to max_attempts)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStatus {
    /// Waiting in the queue for a worker.
    #[default]
    Queuing,
    /// Claimed by a worker, attempt being set up.
    Preparing,
    /// Attempt is executing.
    Running,
    /// Most recent attempt failed and no retry is pending.
    Failed,
    /// Completed successfully.
    Succeeded,
    /// Explicitly cancelled.
    Cancelled,
    /// Previous attempt failed or timed out; waiting to be queued again.
    Requeuing,
}

impl RolloutStatus {
    pub const ALL: [RolloutStatus; 7] = [
        RolloutStatus::Queuing,
        RolloutStatus::Preparing,
        RolloutStatus::Running,
        RolloutStatus::Failed,
        RolloutStatus::Succeeded,
        RolloutStatus::Cancelled,
        RolloutStatus::Requeuing,
    ];

    /// Returns `true` if no further attempt may be created for the rollout.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RolloutStatus::Succeeded | RolloutStatus::Failed | RolloutStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal rollout transition.
    ///
    /// Re-reporting the current status is always accepted. `failed` may feed a
    /// `requeuing` transition when the server still has attempts left. A
    /// preparing rollout may settle directly, like its attempt.
    pub fn can_transition_to(&self, next: RolloutStatus) -> bool {
        use RolloutStatus::*;

        if *self == next {
            return true;
        }
        match self {
            Queuing => matches!(next, Preparing | Running | Cancelled),
            Preparing => matches!(next, Running | Succeeded | Failed | Cancelled | Requeuing),
            Running => matches!(next, Succeeded | Failed | Cancelled | Requeuing),
            Failed => matches!(next, Requeuing),
            Requeuing => matches!(next, Queuing | Preparing | Cancelled),
            Succeeded | Cancelled => false,
        }
    }

    /// Rollout status that reflects the status of its most recent attempt.
    pub fn from_attempt(status: AttemptStatus) -> Self {
        match status {
            AttemptStatus::Preparing => RolloutStatus::Preparing,
            AttemptStatus::Running => RolloutStatus::Running,
            AttemptStatus::Succeeded => RolloutStatus::Succeeded,
            AttemptStatus::Failed => RolloutStatus::Failed,
            AttemptStatus::Unresponsive | AttemptStatus::Timeout => RolloutStatus::Requeuing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RolloutStatus::Queuing => "queuing",
            RolloutStatus::Preparing => "preparing",
            RolloutStatus::Running => "running",
            RolloutStatus::Failed => "failed",
            RolloutStatus::Succeeded => "succeeded",
            RolloutStatus::Cancelled => "cancelled",
            RolloutStatus::Requeuing => "requeuing",
        }
    }
}

impl fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolloutStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        RolloutStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == norm)
            .ok_or_else(|| ModelError::UnknownRolloutStatus(s.to_string()))
    }
}

/// Lifecycle state of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    #[default]
    Preparing,
    Running,
    Failed,
    Succeeded,
    /// Worker stopped reporting heartbeats.
    Unresponsive,
    /// Attempt exceeded the rollout's `timeout_seconds`.
    Timeout,
}

impl AttemptStatus {
    pub const ALL: [AttemptStatus; 6] = [
        AttemptStatus::Preparing,
        AttemptStatus::Running,
        AttemptStatus::Failed,
        AttemptStatus::Succeeded,
        AttemptStatus::Unresponsive,
        AttemptStatus::Timeout,
    ];

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Preparing | AttemptStatus::Running)
    }

    /// `preparing → running → {succeeded | failed | unresponsive | timeout}`.
    ///
    /// A preparing attempt may also end directly (it never got to run).
    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            AttemptStatus::Preparing => next != AttemptStatus::Preparing,
            AttemptStatus::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Preparing => "preparing",
            AttemptStatus::Running => "running",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Unresponsive => "unresponsive",
            AttemptStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        AttemptStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == norm)
            .ok_or_else(|| ModelError::UnknownAttemptStatus(s.to_string()))
    }
}
