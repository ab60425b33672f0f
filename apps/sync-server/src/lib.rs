//! # Recall Sync Server
//!
//! HTTP server exposing the delta-sync endpoints.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Server Endpoints                           │
//! │                                                                         │
//! │  GET  /sync?owner=&since=   Delta pull (tombstones included)           │
//! │  POST /sync?owner=          Push batch (partial success)               │
//! │  GET  /sync/time            Server clock (skew diagnostics)            │
//! │  GET  /health               Liveness probe                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `RECALL_HTTP_PORT` - HTTP listen port (default: 8080)
//! - `RECALL_BIND_ADDR` - bind address (default: 0.0.0.0)
//! - `RECALL_DATABASE_PATH` - SQLite store path (default: ./recall-server.db)
//! - `RECALL_LOG_RETENTION_DAYS` - review log retention (default: 365)

pub mod config;
pub mod error;
pub mod routes;

// Re-exports
pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{router, AppState};
