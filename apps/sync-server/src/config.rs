//! Sync server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Sync server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Bind address (default: 0.0.0.0 for all interfaces)
    pub bind_addr: String,

    /// Path to the SQLite server store
    pub database_path: String,

    /// Review log retention window in days (entries older than this may
    /// be pruned once uploaded). 0 disables pruning.
    pub log_retention_days: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            http_port: env::var("RECALL_HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RECALL_HTTP_PORT".to_string()))?,

            bind_addr: env::var("RECALL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),

            database_path: env::var("RECALL_DATABASE_PATH")
                .unwrap_or_else(|_| "./recall-server.db".to_string()),

            log_retention_days: env::var("RECALL_LOG_RETENTION_DAYS")
                .unwrap_or_else(|_| "365".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RECALL_LOG_RETENTION_DAYS".to_string()))?,
        };

        Ok(config)
    }

    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.http_port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // No env vars set in the test environment for these keys
        let config = ServerConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".into(),
            database_path: "./recall-server.db".into(),
            log_retention_days: 365,
        };
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }
}
