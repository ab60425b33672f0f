//! HTTP route handlers for the sync endpoints.
//!
//! Thin bindings: every handler parses the request, delegates to
//! `recall_sync::SyncService`, and serializes the result. Protocol
//! semantics live in recall-sync, not here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use recall_sync::{PushBatch, PushOutcome, ServerTimeResponse, SyncEnvelope, SyncService};

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
}

/// Builds the router with all sync endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync", get(pull).post(push))
        .route("/sync/time", get(server_time))
        .route("/health", get(health))
        .with_state(state)
}

/// Query parameters of `GET /sync`.
#[derive(Debug, Deserialize)]
pub struct PullParams {
    /// The learner whose dataset is pulled.
    pub owner: String,

    /// Cursor from the previous pull. Absent = full dataset.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// Query parameters of `POST /sync`.
#[derive(Debug, Deserialize)]
pub struct PushParams {
    /// The learner whose entities are pushed.
    pub owner: String,
}

/// `GET /sync?owner=<id>&since=<rfc3339>` - delta pull.
async fn pull(
    State(state): State<AppState>,
    Query(params): Query<PullParams>,
) -> Result<Json<SyncEnvelope>, ApiError> {
    if params.owner.is_empty() {
        return Err(ApiError::BadRequest("owner is required".into()));
    }

    debug!(owner = %params.owner, since = ?params.since, "Pull request");

    let envelope = state.sync.pull(&params.owner, params.since).await?;
    Ok(Json(envelope))
}

/// `POST /sync?owner=<id>` - push a batch of changed entities.
async fn push(
    State(state): State<AppState>,
    Query(params): Query<PushParams>,
    Json(batch): Json<PushBatch>,
) -> Result<Json<PushOutcome>, ApiError> {
    if params.owner.is_empty() {
        return Err(ApiError::BadRequest("owner is required".into()));
    }

    debug!(owner = %params.owner, entities = batch.len(), "Push request");

    let outcome = state.sync.push(&params.owner, batch).await?;
    Ok(Json(outcome))
}

/// `GET /sync/time` - server clock, for client-side skew diagnostics.
async fn server_time(State(state): State<AppState>) -> Json<ServerTimeResponse> {
    Json(ServerTimeResponse {
        server_time: state.sync.server_time(),
    })
}

/// `GET /health` - liveness probe.
async fn health(State(state): State<AppState>) -> StatusCode {
    if state.sync.db().health_check().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
