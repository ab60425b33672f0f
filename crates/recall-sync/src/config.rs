//! # Sync Configuration
//!
//! Configuration management for the client-side sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RECALL_SERVER_URL=https://sync.example.com/                        │
//! │     RECALL_OWNER_ID=abc-123                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/recall/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.recall.app/sync.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device_id, sync disabled until a URL is set         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Laptop"
//!
//! [account]
//! owner_id = "learner-001"
//!
//! [sync]
//! server_url = "https://sync.example.com/"
//! batch_size = 500
//! poll_interval_secs = 60
//! connect_timeout_secs = 10
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::agent::AgentConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Laptop", "Phone").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Recall Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Account Configuration
// =============================================================================

/// The learner this device syncs for.
///
/// Authentication is handled by an outer layer; sync only needs the
/// opaque owner identifier it scopes every request with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Owner identifier. Empty = not configured yet.
    #[serde(default)]
    pub owner_id: String,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the sync server. None = sync disabled (offline only).
    #[serde(default)]
    pub server_url: Option<String>,

    /// Number of entities to upload per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Interval between sync rounds (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Initial backoff duration (milliseconds) after a transient failure.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_batch_size() -> u32 {
    500
}
fn default_poll_interval() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            server_url: None,
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            connect_timeout_secs: default_connect_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete client-side sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Account configuration.
    #[serde(default)]
    pub account: AccountConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Default config file location for this platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "recall", "recall")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Loads configuration: TOML file (if present) with environment
    /// variable overrides, falling back to defaults.
    ///
    /// ## Arguments
    /// * `path` - Config file path; None uses the platform default
    pub fn load_or_default(path: Option<PathBuf>) -> Self {
        let path = path.or_else(Self::default_path);

        let mut config = match &path {
            Some(path) if path.exists() => match Self::load(path) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded sync config");
                    config
                }
                Err(e) => {
                    info!(path = %path.display(), error = %e, "Config unreadable, using defaults");
                    SyncConfig::default()
                }
            },
            _ => SyncConfig::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &PathBuf) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &PathBuf) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(path = %path.display(), "Saved sync config");
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RECALL_SERVER_URL") {
            self.sync.server_url = Some(url);
        }
        if let Ok(owner) = std::env::var("RECALL_OWNER_ID") {
            self.account.owner_id = owner;
        }
    }

    /// Validates that the configuration can drive a sync engine.
    ///
    /// ## Checks
    /// - owner_id is set
    /// - server_url (when present) parses as an absolute URL
    pub fn validate(&self) -> SyncResult<()> {
        if self.account.owner_id.is_empty() {
            return Err(SyncError::MissingOwnerId);
        }

        if let Some(url) = &self.sync.server_url {
            Url::parse(url)?;
        }

        Ok(())
    }

    /// Whether sync is enabled (a server URL is configured).
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.server_url.is_some()
    }

    /// Per-request timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.connect_timeout_secs)
    }

    /// Agent loop timing derived from these settings.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
            initial_backoff: Duration::from_millis(self.sync.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.sync.max_backoff_secs),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert!(config.account.owner_id.is_empty());
        assert!(config.sync.server_url.is_none());
        assert!(!config.is_sync_enabled());
        assert_eq!(config.sync.batch_size, 500);
    }

    #[test]
    fn test_validate_requires_owner() {
        let config = SyncConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SyncError::MissingOwnerId)
        ));

        let mut config = SyncConfig::default();
        config.account.owner_id = "learner-1".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = SyncConfig::default();
        config.account.owner_id = "learner-1".into();
        config.sync.server_url = Some("not a url".into());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_str = r#"
            [device]
            id = "dev-1"
            name = "Laptop"

            [account]
            owner_id = "learner-1"

            [sync]
            server_url = "https://sync.example.com/"
            poll_interval_secs = 30
        "#;

        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.id, "dev-1");
        assert_eq!(config.account.owner_id, "learner-1");
        assert_eq!(config.sync.poll_interval_secs, 30);
        // Unspecified fields fall back to defaults
        assert_eq!(config.sync.batch_size, 500);

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: SyncConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.device.id, "dev-1");
    }

    #[test]
    fn test_agent_config_derivation() {
        let mut config = SyncConfig::default();
        config.sync.poll_interval_secs = 120;
        config.sync.initial_backoff_ms = 250;

        let agent = config.agent_config();
        assert_eq!(agent.poll_interval, Duration::from_secs(120));
        assert_eq!(agent.initial_backoff, Duration::from_millis(250));
    }
}
