//! # recall-core: Pure Scheduling Logic for Recall
//!
//! This crate is the **heart** of Recall. It contains the spaced-repetition
//! scheduler and the domain types as pure code with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Recall Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Quiz / UI (external collaborator)               │   │
//! │  │        shows due cards ──► learner grades ──► record review    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ recall-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐                 │   │
//! │  │   │   types   │  │ scheduler  │  │   error   │                 │   │
//! │  │   │ Progress  │  │ apply_grade│  │ CoreError │                 │   │
//! │  │   │ ReviewLog │  │   (SM-2)   │  │ validation│                 │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    recall-db (Progress Store)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CardProgress, ReviewLogEntry, Deck, Card, ...)
//! - [`scheduler`] - The SM-2-family grading function
//! - [`error`] - Domain error types and validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: `apply_grade` is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Explicit Errors**: Invalid grades are rejected, never clamped
//! 4. **Whole Days**: Intervals are integer days; growth rounds up so a
//!    successful review always earns at least one day
//!
//! ## Example Usage
//!
//! ```rust
//! use recall_core::scheduler::apply_grade;
//! use recall_core::types::{Grade, Scheduling};
//! use chrono::Utc;
//!
//! // A card that has never been reviewed
//! let fresh = Scheduling::fresh();
//!
//! // The learner recalls it correctly
//! let next = apply_grade(&fresh, Grade::Good, Utc::now());
//!
//! assert_eq!(next.interval_days, 1);
//! assert_eq!(next.repetitions, 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod scheduler;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use recall_core::Grade` instead of
// `use recall_core::types::Grade`

pub use error::{CoreError, CoreResult};
pub use scheduler::apply_grade;
pub use types::*;
