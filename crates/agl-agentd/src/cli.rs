use std::{net::SocketAddr, path::PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, builder::BoolishValueParser};

use agl_client::{ClientConfig, DEFAULT_ENDPOINT};
use agl_core::DEFAULT_WORKER_ID;
use agl_exporter::{DEFAULT_SERVICE_NAME, ExportTransport, ExporterConfig};
use agl_model::RolloutMode;

/// Rollout queue worker and operator tools.
#[derive(Parser, Debug)]
#[command(name = "agl")]
#[command(version)]
#[command(about = "Work off, submit and inspect rollouts on an Agent Lightning queue server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the queue server.
    #[arg(long, env = "AGL_SERVER_URL", default_value = DEFAULT_ENDPOINT, global = true)]
    pub server_url: String,

    /// Per-request timeout towards the queue server.
    #[arg(long, env = "AGL_TIMEOUT_MS", default_value_t = 10_000, global = true)]
    pub timeout_ms: u64,

    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    #[arg(long, env = "AGL_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output: text, json or journald.
    #[arg(long, env = "AGL_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.server_url.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Claim rollouts and run them through an analysis command until stopped.
    Worker(WorkerArgs),

    /// Print queue status every few seconds until stopped.
    Monitor(MonitorArgs),

    /// Enqueue posts for analysis.
    Submit(SubmitArgs),

    /// Score succeeded test rollouts against ground truth and store rewards.
    #[command(alias = "eval")]
    Evaluate,

    /// Server health and a status breakdown of recent rollouts.
    Status(StatusArgs),

    /// Success rate, execution time and category distribution.
    Analyze,

    /// Validate local configuration and required environment variables.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Identity reported on dequeue and heartbeat.
    #[arg(long, env = "AGL_WORKER_ID", default_value = DEFAULT_WORKER_ID)]
    pub worker_id: String,

    /// Analysis command; reads the task as JSON on stdin, prints JSON on stdout.
    #[arg(long = "exec", value_name = "PROGRAM")]
    pub exec: String,

    /// Argument passed to the analysis command (repeatable).
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Kill the analysis command after this long.
    #[arg(long)]
    pub exec_timeout_ms: Option<u64>,

    /// Run inputs with an unknown `task_type` through the command unchanged.
    #[arg(long)]
    pub raw_fallback: bool,

    #[arg(long, default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    #[arg(long, default_value_t = 5_000)]
    pub error_backoff_ms: u64,

    /// Serve `/metrics` and `/healthz` on this address.
    #[arg(long, env = "AGL_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Export the worker's own spans to the queue server.
    #[arg(
        long = "export-spans",
        env = "AGL_ENABLED",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enabled: bool,

    /// `add_span` or `otlp`.
    #[arg(long, env = "AGL_EXPORT_TRANSPORT", default_value = "add_span")]
    pub transport: ExportTransport,

    #[arg(long, env = "AGL_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,
}

impl ExportArgs {
    pub fn exporter_config(&self, client: &ClientConfig) -> ExporterConfig {
        ExporterConfig {
            enabled: self.enabled,
            endpoint: client.endpoint.clone(),
            transport: self.transport,
            timeout_ms: client.timeout_ms,
            service_name: self.service_name.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[arg(long, default_value_t = 2_000)]
    pub interval_ms: u64,

    /// Rollouts fetched per poll.
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// JSON array of posts; the built-in test set when omitted.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Dataset split: train, val or test.
    #[arg(long, default_value = "train")]
    pub mode: RolloutMode,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Environment variable that must be set (repeatable).
    #[arg(long = "require", value_name = "NAME")]
    pub required: Vec<String>,
}
