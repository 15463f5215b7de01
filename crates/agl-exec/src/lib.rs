//! Task executors for the worker.
//!
//! - [`FnExecutor`]: an in-process async closure.
//! - [`ProcExecutor`]: an external command that reads the task input as JSON
//!   on stdin and prints its result on stdout.
//! - [`ExecRouter`]: dispatches on the `task_type` field of the input.

pub use agl_core::{ExecError, TaskExecutor};

pub mod r#fn;
pub use r#fn::FnExecutor;

mod json;
pub use json::{extract_json_object, parse_json_output};

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::{ProcConfig, ProcExecutor};

mod router;
pub use router::ExecRouter;

#[cfg(feature = "proc")]
mod util;

pub mod prelude {
    pub use crate::{ExecError, ExecRouter, FnExecutor, TaskExecutor};
    #[cfg(feature = "proc")]
    pub use crate::{ProcConfig, ProcExecutor};
}
