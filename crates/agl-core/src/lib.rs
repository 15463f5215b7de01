//! Worker side of the rollout queue.
//!
//! A [`Worker`] claims rollouts one at a time, runs them through an injected
//! [`TaskExecutor`], settles every claimed attempt as either succeeded or
//! failed, and reports a heartbeat after each iteration.

mod error;
pub use error::CoreError;

mod events;
pub use events::{EventKind, Subscribe, WorkerEvent};

mod executor;
pub use executor::{ExecError, TaskExecutor};

mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics, TaskOutcome, noop_metrics};

mod system;
pub use system::{arch, host_name, init_uptime, memory_usage_mb, platform, uptime_seconds};

mod worker;
pub use worker::{DEFAULT_WORKER_ID, Iteration, Worker, WorkerConfig, WorkerSummary};
