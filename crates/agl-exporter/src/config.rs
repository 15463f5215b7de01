use std::str::FromStr;

use agl_client::{ClientConfig, DEFAULT_ENDPOINT};

use crate::error::ExportError;

pub const DEFAULT_SERVICE_NAME: &str = "agl-agentd";

/// How converted spans reach the queue server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportTransport {
    /// One `POST /add_span` per span.
    #[default]
    AddSpan,
    /// One OTLP/JSON `POST /v1/traces` per span.
    Otlp,
}

impl FromStr for ExportTransport {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add_span" | "add-span" | "agl" => Ok(ExportTransport::AddSpan),
            "otlp" => Ok(ExportTransport::Otlp),
            other => Err(ExportError::UnknownTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub transport: ExportTransport,
    pub timeout_ms: u64,
    /// `service.name` resource attribute attached to every span.
    pub service_name: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transport: ExportTransport::default(),
            timeout_ms: 10_000,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.service_name.trim().is_empty() {
            return Err(ExportError::InvalidConfig("service_name is empty".into()));
        }
        self.client_config().validate()?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}
