//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │  MissingOwnerId │  │  Timeout        │  │  DeserializationFailed  │ │
//! │  │  InvalidUrl     │  │  HttpStatus     │  │  MissingEntityId        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐ │
//! │  │    Database     │  │  Per-entity push rejections are NOT errors: │ │
//! │  │                 │  │  they travel as data (RejectedEntity) so a  │ │
//! │  │  DatabaseError  │  │  batch can partially succeed.               │ │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - `is_retryable()` drives the agent's backoff decisions
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing owner ID (required for sync).
    #[error("Owner ID not configured. Run initial setup first.")]
    MissingOwnerId,

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to reach the sync server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The server answered with a non-success HTTP status.
    #[error("Server returned {status}: {message}")]
    HttpStatus { status: u16, message: String },

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to serialize a request body.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to deserialize a response body.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// A pulled entity arrived without an id.
    #[error("Pulled {entity_type} entity has no id")]
    MissingEntityId { entity_type: String },

    /// A pulled entity violates a scheduling invariant.
    #[error("Invalid {entity_type} entity: {reason}")]
    InvalidEntity {
        entity_type: String,
        reason: String,
    },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Local or server store operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync engine error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<recall_db::DbError> for SyncError {
    fn from(err: recall_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if this error is transient and the sync round can be
    /// retried with backoff.
    ///
    /// ## Retryable Errors
    /// - Connection failures (network issues)
    /// - Timeouts
    /// - Server-side 5xx responses
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Protocol/serialization mismatches
    /// - Client-side 4xx responses
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingOwnerId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout("30s elapsed".into()).is_retryable());
        assert!(SyncError::HttpStatus {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!SyncError::HttpStatus {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingOwnerId.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::HttpStatus {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "Server returned 503: maintenance");
    }
}
