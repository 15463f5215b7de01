use std::path::PathBuf;

use agl_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("queue server is not healthy: {0}")]
    Unhealthy(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid posts file: {0}")]
    InvalidPosts(#[from] serde_json::Error),

    #[error("invalid monitor config: {0}")]
    InvalidConfig(String),
}
