use agl_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("encode span: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid exporter config: {0}")]
    InvalidConfig(String),
    #[error("unknown transport {0:?} (expected add_span or otlp)")]
    UnknownTransport(String),
}
