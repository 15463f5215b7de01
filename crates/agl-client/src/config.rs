use crate::errors::ClientError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:4747";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the queue server.
    pub endpoint: String,
    /// Per-request timeout applied to every call.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ClientError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::InvalidEndpoint(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_server() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.endpoint, "http://localhost:4747");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let cfg = ClientConfig::new("localhost:4747");
        assert!(matches!(cfg.validate(), Err(ClientError::InvalidEndpoint(_))));
    }
}
