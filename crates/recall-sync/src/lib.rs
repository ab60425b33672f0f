//! # recall-sync: Delta Sync Engine for Recall
//!
//! This crate provides the synchronization layer for Recall, enabling
//! offline-first operation with background reconciliation against a
//! central server.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Architecture                                │
//! │                                                                         │
//! │   CLIENT (N devices, offline-tolerant)      SERVER (authoritative)     │
//! │  ┌────────────────────────────────────┐   ┌──────────────────────────┐ │
//! │  │  ┌──────────────┐                  │   │  ┌────────────────────┐  │ │
//! │  │  │  SyncAgent   │  poll/trigger    │   │  │   SyncService      │  │ │
//! │  │  │  (agent.rs)  │───────┐          │   │  │   (server.rs)      │  │ │
//! │  │  └──────────────┘       ▼          │   │  │                    │  │ │
//! │  │  ┌────────────────────────────┐    │   │  │  pull: delta by    │  │ │
//! │  │  │  SyncEngine (engine.rs)    │    │   │  │  updatedAt, with   │  │ │
//! │  │  │                            │    │   │  │  tombstones        │  │ │
//! │  │  │  push pending ──► ack      │◄───┼───┼─►│                    │  │ │
//! │  │  │  pull delta ──► LWW apply  │    │   │  │  push: ownership   │  │ │
//! │  │  │  cursor = serverTime       │    │   │  │  checks, id mint,  │  │ │
//! │  │  └────────────────────────────┘    │   │  │  LWW upsert,       │  │ │
//! │  │            │                       │   │  │  partial success   │  │ │
//! │  │            ▼                       │   │  └────────────────────┘  │ │
//! │  │  ┌────────────────────────────┐    │   │            │             │ │
//! │  │  │  Transport (transport.rs)  │    │   │            ▼             │ │
//! │  │  │  HTTP (reqwest) / loopback │    │   │     recall-db store      │ │
//! │  │  └────────────────────────────┘    │   └──────────────────────────┘ │
//! │  │            │                       │                                │
//! │  │            ▼                       │   Conflict policy:             │
//! │  │     recall-db store                │   last-write-wins by          │
//! │  └────────────────────────────────────┘   updatedAt; losers           │
//! │                                           reconcile on next pull      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - Wire DTOs, envelopes, and the `Syncable` trait
//! - [`server`] - `SyncService`: the authoritative server side
//! - [`engine`] - `SyncEngine`: the client side (pull-apply, push-ack)
//! - [`transport`] - `SyncTransport` trait, HTTP and loopback impls
//! - [`agent`] - Background sync loop with backoff and shutdown
//! - [`config`] - TOML + env configuration for the client
//! - [`error`] - Sync error types with retryability classification
//!
//! ## Guarantees
//!
//! - **Offline-first**: grading never blocks on sync; a failed round only
//!   moves the "last synced" indicator
//! - **Resumable**: the cursor advances only after a pull is fully applied,
//!   and pending flags clear only on acknowledgement - cancelling an
//!   in-flight round never corrupts local state
//! - **Idempotent push**: upsert-by-id makes retries safe after timeouts
//! - **Tombstone propagation**: deletions travel as data (`deletedAt`),
//!   never as omissions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recall_sync::{AgentConfig, HttpTransport, SyncAgent, SyncConfig, SyncEngine};
//! use recall_db::{Database, DbConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! config.validate()?;
//!
//! let db = Database::new(DbConfig::new("./recall.db")).await?;
//! let transport = HttpTransport::new(
//!     config.sync.server_url.as_deref().unwrap(),
//!     config.connect_timeout(),
//! )?;
//!
//! let engine = SyncEngine::new(db, transport, &config.account.owner_id);
//! let (agent, handle) = SyncAgent::new(engine, config.agent_config());
//! tokio::spawn(agent.run());
//!
//! // Later: "sync now" button
//! handle.trigger().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentConfig, AgentStatus, SyncAgent, SyncAgentHandle};
pub use config::SyncConfig;
pub use engine::{PullSummary, PushSummary, SyncEngine, SyncSummary};
pub use error::{SyncError, SyncResult};
pub use protocol::{
    PushBatch, PushOutcome, RejectedEntity, ServerTimeResponse, SyncEnvelope, Syncable,
    PROTOCOL_VERSION,
};
pub use server::SyncService;
pub use transport::{HttpTransport, LocalTransport, SyncTransport};
