//! Network configuration for the validation server.

use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Deadline for health probes. Validations are never timed out.
    pub probe_timeout: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            probe_timeout: Duration::from_secs(10),
            max_body_bytes: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.max_body_bytes, 65_536);
    }
}
