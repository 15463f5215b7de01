//! Operator tools around the rollout queue: submitting the post-analysis
//! dataset, evaluating finished rollouts against ground truth, and
//! inspecting queue state.

mod error;
pub use error::ToolError;

mod dataset;
pub use dataset::{
    Expected, GroundTruth, Post, expected_classifications, load_posts, parse_posts, test_posts,
};

mod submit;
pub use submit::{
    POST_ANALYSIS_TASK, SubmitReport, post_analysis_config, post_analysis_input, submit_posts,
};

mod status;
pub use status::{StatusSummary, check_health, count_by_status, recent_rollouts, status_summary};

mod evaluate;
pub use evaluate::{EvaluatedRollout, EvaluationSummary, Reward, evaluate, score};

mod analyze;
pub use analyze::{Analysis, Readiness, TimeStats, analyze};

mod monitor;
pub use monitor::{Monitor, MonitorConfig, MonitorSnapshot};

mod executor;
pub use executor::{PostAnalysis, PostAnalysisExecutor, analysis_prompt};

/// Upper bound the server accepts for one query.
pub const QUERY_LIMIT: usize = 1000;
