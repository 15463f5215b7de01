use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::{
    ExecError, TaskExecutor,
    json::parse_json_output,
    util::{cmd_program, stderr_tail},
};

/// External analysis command.
#[derive(Clone, Debug, Default)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Kill the command if it runs longer than this.
    pub timeout_ms: Option<u64>,
}

impl ProcConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Runs one process per task.
///
/// The rollout input is written to stdin as JSON; the outermost JSON object
/// found on stdout is the result. Stderr is captured for error reports.
pub struct ProcExecutor {
    name: String,
    cfg: ProcConfig,
}

impl ProcExecutor {
    pub fn new(cfg: ProcConfig) -> Self {
        Self {
            name: "proc".to_string(),
            cfg,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output, ExecError> {
        let mut cmd = cmd_program(&self.cfg.program, &self.cfg.args);
        if let Some(cwd) = &self.cfg.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.cfg.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(program = %self.cfg.program, args = ?self.cfg.args, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {}", self.cfg.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "command closed stdin early");
                }
                let _ = stdin.shutdown().await;
            });
        }

        let output = child.wait_with_output();
        match self.cfg.timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), output).await {
                Ok(out) => Ok(out?),
                Err(_) => {
                    warn!(program = %self.cfg.program, timeout_ms = ms, "command timed out; killed");
                    Err(ExecError::Timeout(ms))
                }
            },
            None => Ok(output.await?),
        }
    }
}

#[async_trait]
impl TaskExecutor for ProcExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: &Value) -> Result<Value, ExecError> {
        if self.cfg.program.is_empty() {
            return Err(ExecError::Spawn("program is empty".into()));
        }
        let payload =
            serde_json::to_vec(input).map_err(|e| ExecError::InvalidInput(e.to_string()))?;

        let output = self.run(payload).await?;
        if !output.status.success() {
            return Err(match output.status.code() {
                Some(code) => ExecError::NonZeroExit {
                    code,
                    stderr: stderr_tail(&output.stderr),
                },
                None => ExecError::KilledBySignal,
            });
        }

        debug!(program = %self.cfg.program, stdout_bytes = output.stdout.len(), "exit success");
        parse_json_output(&String::from_utf8_lossy(&output.stdout))
    }
}
