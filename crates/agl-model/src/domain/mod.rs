mod ids;
pub use ids::{AttemptId, RolloutId};

mod status;
pub use status::{AttemptStatus, RolloutStatus};

mod rollout;
pub use rollout::{
    Attempt, AttemptedRollout, Metadata, Rollout, RolloutConfig, RolloutMode, merge_metadata,
};

mod update;
pub use update::{AttemptUpdate, EnqueueRequest, RolloutUpdate};

mod rollout_query;
pub use rollout_query::{RolloutPage, RolloutQuery};

mod heartbeat;
pub use heartbeat::HeartbeatStats;

mod server;
pub use server::{Health, Resources};

/// Identifier a worker process reports itself under.
pub type WorkerId = String;

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;
