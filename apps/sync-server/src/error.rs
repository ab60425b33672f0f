//! Error types for the sync server HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use recall_sync::SyncError;

/// HTTP-facing errors.
///
/// Per-entity push rejections are NOT errors - they ride inside a 200
/// response as data (partial-success semantics). This type covers
/// request-level failures only.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::MissingOwnerId | SyncError::InvalidUrl(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SyncError::MissingEntityId { .. }
            | SyncError::InvalidEntity { .. }
            | SyncError::DeserializationFailed(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_mapping() {
        let err: ApiError = SyncError::MissingOwnerId.into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = SyncError::DatabaseError("disk full".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
