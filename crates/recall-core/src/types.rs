//! # Domain Types
//!
//! Core domain types used throughout Recall.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CardProgress   │   │ ReviewLogEntry  │   │      Card       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  owner/card ids │   │  grade          │   │  deck_id (FK)   │       │
//! │  │  learning_state │   │  before/after   │   │  front / back   │       │
//! │  │  interval, EF   │   │  reviewed_at    │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Grade       │   │ LearningState   │   │   SyncStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Again          │   │  New            │   │  Pending        │       │
//! │  │  Hard           │   │  Learning       │   │  Synced         │       │
//! │  │  Good           │   │  Reviewing      │   └─────────────────┘       │
//! │  │  Easy           │   │  Relearning     │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sync Bookkeeping Pattern
//! Every entity that crosses the sync boundary carries:
//! - `id`: UUID v4 string - stable across devices, never reused
//! - `updated_at`: last-write-wins stamp, set by the mutating device
//! - `deleted_at`: soft-delete tombstone (None = live)
//! - `sync_status`: Pending until acknowledged by the server

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreError;

// =============================================================================
// Constants
// =============================================================================

/// Lower bound for the ease factor. SM-2 never lets a card's ease drop
/// below this, no matter how many times it is failed.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor assigned to a card that has never been reviewed.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Minimum interval (days) produced by any successful or failed review.
pub const MIN_INTERVAL_DAYS: i64 = 1;

// =============================================================================
// Grade
// =============================================================================

/// The learner's self-reported recall quality for one review.
///
/// Grades outside this set are rejected at the API boundary
/// ([`Grade::from_str`]) and never clamped into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// Failed to recall; the card is relearned from scratch.
    Again,
    /// Recalled with serious difficulty.
    Hard,
    /// Recalled correctly.
    Good,
    /// Recalled effortlessly.
    Easy,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Again => write!(f, "again"),
            Grade::Hard => write!(f, "hard"),
            Grade::Good => write!(f, "good"),
            Grade::Easy => write!(f, "easy"),
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "again" => Ok(Grade::Again),
            "hard" => Ok(Grade::Hard),
            "good" => Ok(Grade::Good),
            "easy" => Ok(Grade::Easy),
            other => Err(CoreError::InvalidGrade(other.to_string())),
        }
    }
}

// =============================================================================
// Learning State
// =============================================================================

/// Where a card sits in the scheduling state machine.
///
/// ## State Machine
/// ```text
/// NEW ──► { LEARNING, REVIEWING } ──► RELEARNING ──► REVIEWING ──► ...
/// ```
/// NEW is implicit: a card with no persisted progress row is NEW. There is
/// no terminal state; reviews repeat indefinitely. The scheduler's grade
/// table only ever emits REVIEWING or RELEARNING; LEARNING remains a valid
/// input state for rows synced from other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LearningState {
    /// Never reviewed.
    New,
    /// In an initial learning phase.
    Learning,
    /// Regular spaced review.
    Reviewing,
    /// Failed and being relearned. Implies `repetitions == 0`.
    Relearning,
}

impl Default for LearningState {
    fn default() -> Self {
        LearningState::New
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Whether a local row has been acknowledged by the server.
///
/// Pending rows are collected by the sync engine's push; acknowledged rows
/// flip to Synced so retries never re-upload confirmed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Locally modified, not yet confirmed by the server.
    Pending,
    /// Server has acknowledged this version of the row.
    Synced,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Pending
    }
}

// =============================================================================
// Scheduling
// =============================================================================

/// The mutable scheduling fields of a card, as a value type.
///
/// This is what the scheduler transforms: `apply_grade(&Scheduling, grade,
/// now) -> Scheduling`. Keeping it separate from [`CardProgress`] keeps the
/// scheduler pure and trivially testable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    /// Current state in the learning state machine.
    pub learning_state: LearningState,

    /// Days until the next scheduled review. 0 = never scheduled.
    pub interval_days: i64,

    /// Multiplier controlling interval growth. Always >= 1.3.
    pub ease_factor: f64,

    /// Count of consecutive non-failing reviews.
    pub repetitions: i64,

    /// When the card is next due. None = due immediately.
    #[ts(as = "Option<String>")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl Scheduling {
    /// Scheduling state of a card that has never been reviewed.
    pub fn fresh() -> Self {
        Scheduling {
            learning_state: LearningState::New,
            interval_days: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
            next_review_at: None,
        }
    }

    /// A card is due when it was never scheduled or its due date has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_review_at {
            None => true,
            Some(due) => due <= now,
        }
    }
}

impl Default for Scheduling {
    fn default() -> Self {
        Scheduling::fresh()
    }
}

// =============================================================================
// Card Progress
// =============================================================================

/// Per-learner scheduling state for one card. The unit the scheduler
/// mutates and the sync engine reconciles.
///
/// ## Lifecycle
/// Created on the first review of a card (implicitly NEW before that, no
/// persisted row required); mutated only by the scheduler via a grading
/// event; soft-deleted when the owning card is deleted, never hard-deleted
/// while sync partners may still hold it.
///
/// ## Invariants
/// - exactly one live row per (owner_id, card_id)
/// - `ease_factor >= 1.3`, `interval_days >= 0`
/// - `Relearning` implies `repetitions == 0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CardProgress {
    /// Unique identifier (UUID v4). Stable across devices, never reused.
    pub id: String,

    /// The learner this progress belongs to.
    pub owner_id: String,

    /// The card being scheduled.
    pub card_id: String,

    /// Current state in the learning state machine.
    pub learning_state: LearningState,

    /// Days until the next scheduled review.
    pub interval_days: i64,

    /// Interval growth multiplier. Always >= 1.3.
    pub ease_factor: f64,

    /// Count of consecutive non-failing reviews.
    pub repetitions: i64,

    /// When the card is next due. None = due immediately.
    #[ts(as = "Option<String>")]
    pub next_review_at: Option<DateTime<Utc>>,

    /// When this row was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Last local mutation - the sync anchor.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Soft-delete tombstone.
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Whether the server has acknowledged this version.
    pub sync_status: SyncStatus,
}

impl CardProgress {
    /// Creates a fresh, never-reviewed progress row for (owner, card).
    pub fn new(owner_id: &str, card_id: &str, now: DateTime<Utc>) -> Self {
        let sched = Scheduling::fresh();
        CardProgress {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            card_id: card_id.to_string(),
            learning_state: sched.learning_state,
            interval_days: sched.interval_days,
            ease_factor: sched.ease_factor,
            repetitions: sched.repetitions,
            next_review_at: sched.next_review_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
        }
    }

    /// Returns the scheduling fields as a value snapshot.
    pub fn scheduling(&self) -> Scheduling {
        Scheduling {
            learning_state: self.learning_state,
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions,
            next_review_at: self.next_review_at,
        }
    }

    /// Writes a scheduling result back into the row. The caller is
    /// responsible for stamping `updated_at` and marking the row pending.
    pub fn apply_scheduling(&mut self, sched: Scheduling) {
        self.learning_state = sched.learning_state;
        self.interval_days = sched.interval_days;
        self.ease_factor = sched.ease_factor;
        self.repetitions = sched.repetitions;
        self.next_review_at = sched.next_review_at;
    }

    /// A progress row is due when live and never-scheduled or overdue.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.scheduling().is_due(now)
    }

    /// Whether this row is a soft-delete tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// Review Log Entry
// =============================================================================

/// Immutable audit record of one grading event.
///
/// Created by the scheduler's caller immediately after a successful
/// transition; never mutated afterwards and never destroyed by the client.
/// The server may prune entries after upload and a retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The progress row this review applied to.
    pub card_progress_id: String,

    /// The learner who graded.
    pub owner_id: String,

    /// Grade the learner reported.
    pub grade: Grade,

    /// How long the learner took to answer, if measured.
    pub time_taken_seconds: Option<i64>,

    /// Interval before the review (days).
    pub previous_interval: i64,

    /// Interval after the review (days).
    pub new_interval: i64,

    /// Ease factor before the review.
    pub previous_ease_factor: f64,

    /// Ease factor after the review.
    pub new_ease_factor: f64,

    /// Learning state the review produced.
    pub resulting_state: LearningState,

    /// When the review happened.
    #[ts(as = "String")]
    pub reviewed_at: DateTime<Utc>,

    /// Sync anchor. Equal to `reviewed_at` for client-created entries.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Soft-delete tombstone (used only by server-side retention).
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Whether the server has acknowledged this entry.
    pub sync_status: SyncStatus,
}

impl ReviewLogEntry {
    /// Records a grading event from the before/after scheduling snapshots.
    pub fn record(
        card_progress_id: &str,
        owner_id: &str,
        grade: Grade,
        before: &Scheduling,
        after: &Scheduling,
        time_taken_seconds: Option<i64>,
        reviewed_at: DateTime<Utc>,
    ) -> Self {
        ReviewLogEntry {
            id: Uuid::new_v4().to_string(),
            card_progress_id: card_progress_id.to_string(),
            owner_id: owner_id.to_string(),
            grade,
            time_taken_seconds,
            previous_interval: before.interval_days,
            new_interval: after.interval_days,
            previous_ease_factor: before.ease_factor,
            new_ease_factor: after.ease_factor,
            resulting_state: after.learning_state,
            reviewed_at,
            updated_at: reviewed_at,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

// =============================================================================
// Deck
// =============================================================================

/// A collection of cards belonging to a learner.
///
/// Deck CRUD lives outside the core; the type exists here because the sync
/// engine reconciles decks alongside the progress rows that reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub owner_id: String,
    /// Optional parent folder. None = top level.
    pub folder_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

impl Deck {
    pub fn new(owner_id: &str, name: &str, now: DateTime<Utc>) -> Self {
        Deck {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            folder_id: None,
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

// =============================================================================
// Card
// =============================================================================

/// One flashcard. Ownership derives from the parent deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub deck_id: String,
    /// Question side.
    pub front: String,
    /// Answer side.
    pub back: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

impl Card {
    pub fn new(deck_id: &str, front: &str, back: &str, now: DateTime<Utc>) -> Self {
        Card {
            id: Uuid::new_v4().to_string(),
            deck_id: deck_id.to_string(),
            front: front.to_string(),
            back: back.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

// =============================================================================
// Folder
// =============================================================================

/// A folder grouping decks. May nest via `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub parent_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
}

impl Folder {
    pub fn new(owner_id: &str, name: &str, now: DateTime<Utc>) -> Self {
        Folder {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            parent_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Returns the due date for an interval starting now.
pub fn next_review_date(now: DateTime<Utc>, interval_days: i64) -> DateTime<Utc> {
    now + Duration::days(interval_days)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_grade_parse() {
        assert_eq!(Grade::from_str("good").unwrap(), Grade::Good);
        assert_eq!(Grade::from_str("AGAIN").unwrap(), Grade::Again);
        assert!(Grade::from_str("perfect").is_err());
        assert!(Grade::from_str("").is_err());
    }

    #[test]
    fn test_grade_parse_never_clamps() {
        // Out-of-range grades must be rejected, not coerced into range
        let err = Grade::from_str("3").unwrap_err();
        assert!(err.to_string().contains("3"));
    }

    #[test]
    fn test_grade_wire_format() {
        let json = serde_json::to_string(&Grade::Again).unwrap();
        assert_eq!(json, "\"again\"");
        let state = serde_json::to_string(&LearningState::Relearning).unwrap();
        assert_eq!(state, "\"relearning\"");
    }

    #[test]
    fn test_fresh_scheduling_defaults() {
        let sched = Scheduling::fresh();
        assert_eq!(sched.learning_state, LearningState::New);
        assert_eq!(sched.interval_days, 0);
        assert_eq!(sched.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(sched.repetitions, 0);
        assert!(sched.next_review_at.is_none());
    }

    #[test]
    fn test_is_due() {
        let now = t("2026-03-01T12:00:00Z");

        // Never scheduled = due immediately
        let fresh = Scheduling::fresh();
        assert!(fresh.is_due(now));

        // Due date in the past = due
        let overdue = Scheduling {
            next_review_at: Some(t("2026-02-20T12:00:00Z")),
            ..Scheduling::fresh()
        };
        assert!(overdue.is_due(now));

        // Due date in the future = not due
        let future = Scheduling {
            next_review_at: Some(t("2026-03-05T12:00:00Z")),
            ..Scheduling::fresh()
        };
        assert!(!future.is_due(now));
    }

    #[test]
    fn test_deleted_progress_never_due() {
        let now = t("2026-03-01T12:00:00Z");
        let mut progress = CardProgress::new("owner-1", "card-1", now);
        assert!(progress.is_due(now));

        progress.deleted_at = Some(now);
        assert!(!progress.is_due(now));
    }

    #[test]
    fn test_review_log_captures_before_and_after() {
        let now = t("2026-03-01T12:00:00Z");
        let before = Scheduling {
            learning_state: LearningState::Reviewing,
            interval_days: 7,
            ease_factor: 2.5,
            repetitions: 3,
            next_review_at: Some(now),
        };
        let after = Scheduling {
            learning_state: LearningState::Relearning,
            interval_days: 1,
            ease_factor: 2.3,
            repetitions: 0,
            next_review_at: Some(next_review_date(now, 1)),
        };

        let entry = ReviewLogEntry::record(
            "progress-1",
            "owner-1",
            Grade::Again,
            &before,
            &after,
            Some(12),
            now,
        );

        assert_eq!(entry.previous_interval, 7);
        assert_eq!(entry.new_interval, 1);
        assert_eq!(entry.previous_ease_factor, 2.5);
        assert_eq!(entry.new_ease_factor, 2.3);
        assert_eq!(entry.resulting_state, LearningState::Relearning);
        assert_eq!(entry.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn test_next_review_date() {
        let now = t("2026-03-01T12:00:00Z");
        assert_eq!(next_review_date(now, 18), t("2026-03-19T12:00:00Z"));
    }
}
