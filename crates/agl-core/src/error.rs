use agl_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A queue server call failed; the iteration is abandoned and retried after backoff.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: ClientError,
    },
    #[error("queue server is not healthy: status {0:?}")]
    Unhealthy(String),
    #[error("invalid worker config: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    pub(crate) fn transport(operation: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| CoreError::Transport { operation, source }
    }

    /// Name of the failed queue operation, if this is a transport error.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            CoreError::Transport { operation, .. } => Some(operation),
            _ => None,
        }
    }
}
