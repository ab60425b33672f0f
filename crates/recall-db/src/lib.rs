//! # recall-db: Progress Store for Recall
//!
//! This crate provides database access for the Recall system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Recall Data Flow                                 │
//! │                                                                         │
//! │  Grading call (record_review) / Sync engine (pull, push)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     recall-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (progress.rs) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProgressRepo  │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ DeckRepo ...  │    │ ...          │  │   │
//! │  │   │ Management    │    │ CursorRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (one per sync participant: each client, the server)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (progress, deck, card, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recall_db::{Database, DbConfig};
//!
//! // Create database with default config
//! let db = Database::new(DbConfig::new("path/to/recall.db")).await?;
//!
//! // Grade a card (the only scheduler entry point)
//! let outcome = db.progress()
//!     .record_review("owner-1", "card-1", Grade::Good, None, Utc::now())
//!     .await?;
//!
//! // What is due right now?
//! let due = db.progress().due_cards("owner-1", Utc::now(), 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::card::CardRepository;
pub use repository::cursor::CursorRepository;
pub use repository::deck::DeckRepository;
pub use repository::folder::FolderRepository;
pub use repository::progress::{ProgressRepository, ReviewOutcome};
pub use repository::review_log::ReviewLogRepository;
