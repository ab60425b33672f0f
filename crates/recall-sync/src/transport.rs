//! # Sync Transport
//!
//! Pluggable transport layer between the sync engine and the server.
//!
//! ## Design
//! The engine only knows the three protocol operations; what carries them
//! is swappable:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Transport Implementations                        │
//! │                                                                         │
//! │  SyncEngine ──► trait SyncTransport { pull, push, server_time }        │
//! │                        │                                                │
//! │          ┌─────────────┴─────────────┐                                  │
//! │          ▼                           ▼                                  │
//! │  ┌───────────────┐          ┌─────────────────┐                         │
//! │  │ HttpTransport │          │ LocalTransport  │                         │
//! │  │               │          │                 │                         │
//! │  │ reqwest JSON  │          │ calls the       │                         │
//! │  │ GET/POST sync │          │ SyncService     │                         │
//! │  │ GET sync/time │          │ in-process      │                         │
//! │  └───────────────┘          └─────────────────┘                         │
//! │   production                 tests, embedded single-binary setups       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Network I/O lives only here. Every operation is a plain future: dropping
//! it cancels the request, and the engine's cursor discipline guarantees a
//! cancelled round leaves local state at the last known-good snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    PushBatch, PushOutcome, ServerTimeResponse, SyncEnvelope, PROTOCOL_VERSION,
};
use crate::server::SyncService;

// =============================================================================
// Transport Trait
// =============================================================================

/// The three wire operations of the sync protocol.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Fetches every entity changed after `since` (absent = everything).
    async fn pull(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncEnvelope>;

    /// Uploads a batch of changed entities.
    async fn push(&self, owner_id: &str, batch: PushBatch) -> SyncResult<PushOutcome>;

    /// Fetches the server clock (clock-skew diagnostics only).
    async fn server_time(&self) -> SyncResult<DateTime<Utc>>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Talks to a remote sync server over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates an HTTP transport against a server base URL.
    ///
    /// ## Arguments
    /// * `base_url` - e.g. `https://sync.example.com/` (trailing slash
    ///   recommended; endpoint paths are joined onto it)
    /// * `timeout` - per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(e.to_string()))?;

        Ok(HttpTransport { client, base_url })
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Maps a non-success response into a typed error.
    async fn check_status(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::HttpStatus {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn pull(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncEnvelope> {
        let mut url = self.endpoint("sync")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("owner", owner_id);
            if let Some(since) = since {
                pairs.append_pair("since", &since.to_rfc3339());
            }
        }

        debug!(%url, "Pulling delta");

        let response = self
            .client
            .get(url)
            .header("X-Recall-Protocol", PROTOCOL_VERSION)
            .send()
            .await?;

        let envelope = Self::check_status(response)
            .await?
            .json::<SyncEnvelope>()
            .await?;

        Ok(envelope)
    }

    async fn push(&self, owner_id: &str, batch: PushBatch) -> SyncResult<PushOutcome> {
        let mut url = self.endpoint("sync")?;
        url.query_pairs_mut().append_pair("owner", owner_id);

        debug!(%url, entities = batch.len(), "Pushing batch");

        let response = self
            .client
            .post(url)
            .header("X-Recall-Protocol", PROTOCOL_VERSION)
            .json(&batch)
            .send()
            .await?;

        let outcome = Self::check_status(response)
            .await?
            .json::<PushOutcome>()
            .await?;

        Ok(outcome)
    }

    async fn server_time(&self) -> SyncResult<DateTime<Utc>> {
        let url = self.endpoint("sync/time")?;

        let response = self.client.get(url).send().await?;
        let body = Self::check_status(response)
            .await?
            .json::<ServerTimeResponse>()
            .await?;

        Ok(body.server_time)
    }
}

// =============================================================================
// Local (Loopback) Transport
// =============================================================================

/// Drives a [`SyncService`] in-process, no network involved.
///
/// ## Usage
/// - Round-trip tests: several client stores against one server store
/// - Single-binary deployments where client and server share a process
#[derive(Debug, Clone)]
pub struct LocalTransport {
    service: Arc<SyncService>,
}

impl LocalTransport {
    /// Creates a loopback transport over a sync service.
    pub fn new(service: SyncService) -> Self {
        LocalTransport {
            service: Arc::new(service),
        }
    }
}

#[async_trait]
impl SyncTransport for LocalTransport {
    async fn pull(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncEnvelope> {
        self.service.pull(owner_id, since).await
    }

    async fn push(&self, owner_id: &str, batch: PushBatch) -> SyncResult<PushOutcome> {
        self.service.push(owner_id, batch).await
    }

    async fn server_time(&self) -> SyncResult<DateTime<Utc>> {
        Ok(self.service.server_time())
    }
}
