//! # Card Progress Repository
//!
//! Database operations for per-learner scheduling state: the record-review
//! transaction, the due-card selector, and the sync-facing queries.
//!
//! ## The Grading Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_review Flow                                 │
//! │                                                                         │
//! │  Quiz / UI calls record_review(owner, card, grade, time_taken, now)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT progress WHERE owner_id = ? AND card_id = ?         │   │
//! │  │     (no row yet? the card is implicitly NEW - create one)      │   │
//! │  │                                                                 │   │
//! │  │  2. apply_grade(before, grade, now)   ← pure, recall-core      │   │
//! │  │                                                                 │   │
//! │  │  3. UPSERT card_progress, stamped updated_at = now,            │   │
//! │  │     sync_status = 'pending'                                    │   │
//! │  │                                                                 │   │
//! │  │  4. INSERT review_log (immutable audit entry)                  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Progress and its audit entry land together or not at all    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use recall_core::{apply_grade, CardProgress, Grade, ReviewLogEntry, SyncStatus};

/// Result of one grading event: the updated progress row and the audit
/// entry that was appended alongside it.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub progress: CardProgress,
    pub log_entry: ReviewLogEntry,
}

/// Repository for card progress operations.
#[derive(Debug, Clone)]
pub struct ProgressRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = "p.id, p.owner_id, p.card_id, p.learning_state, p.interval_days, \
     p.ease_factor, p.repetitions, p.next_review_at, p.created_at, p.updated_at, \
     p.deleted_at, p.sync_status";

impl ProgressRepository {
    /// Creates a new ProgressRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProgressRepository { pool }
    }

    /// Gets the progress row for (owner, card), tombstoned or not.
    pub async fn get(&self, owner_id: &str, card_id: &str) -> DbResult<Option<CardProgress>> {
        let progress = sqlx::query_as::<_, CardProgress>(
            r#"
            SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                   repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
            FROM card_progress
            WHERE owner_id = ?1 AND card_id = ?2
            "#,
        )
        .bind(owner_id)
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    /// Gets a progress row by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CardProgress>> {
        let progress = sqlx::query_as::<_, CardProgress>(
            r#"
            SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                   repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
            FROM card_progress
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    /// Records one grading event.
    ///
    /// This is the only entry point through which quiz/UI code drives the
    /// scheduler. Loads (or implicitly creates) the progress row, applies
    /// the grade, persists the new state marked pending-sync, and appends
    /// the review log entry - all in one transaction.
    ///
    /// ## Arguments
    /// * `owner_id` - The learner grading the card
    /// * `card_id` - The card being graded
    /// * `grade` - Recall quality (already validated at the API boundary)
    /// * `time_taken_seconds` - How long the answer took, if measured
    /// * `now` - The grading timestamp (local clock; used for scheduling
    ///   math and as the row's new write stamp)
    pub async fn record_review(
        &self,
        owner_id: &str,
        card_id: &str,
        grade: Grade,
        time_taken_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> DbResult<ReviewOutcome> {
        debug!(owner_id = %owner_id, card_id = %card_id, grade = %grade, "Recording review");

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CardProgress>(
            r#"
            SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                   repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
            FROM card_progress
            WHERE owner_id = ?1 AND card_id = ?2
            "#,
        )
        .bind(owner_id)
        .bind(card_id)
        .fetch_optional(&mut *tx)
        .await?;

        // A card with no persisted row is implicitly NEW
        let mut progress =
            existing.unwrap_or_else(|| CardProgress::new(owner_id, card_id, now));

        let before = progress.scheduling();
        let after = apply_grade(&before, grade, now);

        progress.apply_scheduling(after);
        progress.updated_at = now;
        progress.sync_status = SyncStatus::Pending;
        // Grading a resurrected card revives its tombstoned progress
        progress.deleted_at = None;

        upsert_in(&mut tx, &progress).await?;

        let log_entry = ReviewLogEntry::record(
            &progress.id,
            owner_id,
            grade,
            &before,
            &after,
            time_taken_seconds,
            now,
        );

        sqlx::query(
            r#"
            INSERT INTO review_log (
                id, card_progress_id, owner_id, grade, time_taken_seconds,
                previous_interval, new_interval, previous_ease_factor, new_ease_factor,
                resulting_state, reviewed_at, updated_at, deleted_at, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&log_entry.id)
        .bind(&log_entry.card_progress_id)
        .bind(&log_entry.owner_id)
        .bind(log_entry.grade)
        .bind(log_entry.time_taken_seconds)
        .bind(log_entry.previous_interval)
        .bind(log_entry.new_interval)
        .bind(log_entry.previous_ease_factor)
        .bind(log_entry.new_ease_factor)
        .bind(log_entry.resulting_state)
        .bind(log_entry.reviewed_at)
        .bind(log_entry.updated_at)
        .bind(log_entry.deleted_at)
        .bind(log_entry.sync_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReviewOutcome {
            progress,
            log_entry,
        })
    }

    /// Returns the ordered set of cards due for review "now".
    ///
    /// ## Selection
    /// `next_review_at` absent OR `next_review_at <= now`, excluding
    /// soft-deleted progress and soft-deleted parent cards.
    ///
    /// ## Ordering
    /// Never-scheduled progress sorts before everything else (brand-new
    /// material surfaces first), then scheduled items ascending by due date
    /// (oldest overdue debt cleared first).
    pub async fn due_cards(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<CardProgress>> {
        let rows = sqlx::query_as::<_, CardProgress>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM card_progress p
            JOIN cards c ON c.id = p.card_id
            WHERE p.owner_id = ?1
              AND p.deleted_at IS NULL
              AND c.deleted_at IS NULL
              AND (p.next_review_at IS NULL OR p.next_review_at <= ?2)
            ORDER BY p.next_review_at IS NOT NULL, p.next_review_at ASC, p.created_at ASC
            LIMIT ?3
            "#
        ))
        .bind(owner_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Deck-scoped variant of [`due_cards`](Self::due_cards): restricts the
    /// selection to cards of one deck.
    pub async fn due_cards_in_deck(
        &self,
        owner_id: &str,
        deck_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<CardProgress>> {
        let rows = sqlx::query_as::<_, CardProgress>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM card_progress p
            JOIN cards c ON c.id = p.card_id
            WHERE p.owner_id = ?1
              AND c.deck_id = ?2
              AND p.deleted_at IS NULL
              AND c.deleted_at IS NULL
              AND (p.next_review_at IS NULL OR p.next_review_at <= ?3)
            ORDER BY p.next_review_at IS NOT NULL, p.next_review_at ASC, p.created_at ASC
            LIMIT ?4
            "#
        ))
        .bind(owner_id)
        .bind(deck_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Upserts a progress row by ID, preserving every field as given.
    pub async fn upsert(&self, progress: &CardProgress) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        upsert_in(&mut tx, progress).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Applies a progress row arriving from a pull response.
    ///
    /// Last-write-wins by `updated_at`: the remote copy is written only if
    /// it is strictly newer than whatever this store holds for the row's id
    /// or its (owner, card) pair. A same-pair row under a different id (two
    /// devices graded the same card before ever syncing) is replaced by the
    /// winning copy so the one-row-per-pair invariant holds.
    ///
    /// ## Returns
    /// `true` if the remote copy was written, `false` if the local row won.
    pub async fn apply_remote(&self, remote: &CardProgress) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let local = sqlx::query_as::<_, CardProgress>(
            r#"
            SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                   repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
            FROM card_progress
            WHERE id = ?1 OR (owner_id = ?2 AND card_id = ?3)
            "#,
        )
        .bind(&remote.id)
        .bind(&remote.owner_id)
        .bind(&remote.card_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref local) = local {
            if local.updated_at >= remote.updated_at {
                return Ok(false);
            }
            if local.id != remote.id {
                sqlx::query("DELETE FROM card_progress WHERE id = ?1")
                    .bind(&local.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let mut accepted = remote.clone();
        accepted.sync_status = SyncStatus::Synced;
        upsert_in(&mut tx, &accepted).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Server-side apply of a pushed progress row.
    ///
    /// The protocol is last-write-wins by push order: the server copy is
    /// overwritten unconditionally. A same-pair row under a different id is
    /// replaced by the pushed copy.
    pub async fn apply_pushed(&self, pushed: &CardProgress) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM card_progress
            WHERE owner_id = ?1 AND card_id = ?2 AND id <> ?3
            "#,
        )
        .bind(&pushed.owner_id)
        .bind(&pushed.card_id)
        .bind(&pushed.id)
        .execute(&mut *tx)
        .await?;

        let mut accepted = pushed.clone();
        accepted.sync_status = SyncStatus::Synced;
        upsert_in(&mut tx, &accepted).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets every progress row of an owner changed after `since`
    /// (tombstones included), or all rows when `since` is absent.
    pub async fn changed_since(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<CardProgress>> {
        let rows = match since {
            Some(since) => {
                sqlx::query_as::<_, CardProgress>(
                    r#"
                    SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                           repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
                    FROM card_progress
                    WHERE owner_id = ?1 AND updated_at > ?2
                    ORDER BY updated_at ASC
                    "#,
                )
                .bind(owner_id)
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CardProgress>(
                    r#"
                    SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                           repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
                    FROM card_progress
                    WHERE owner_id = ?1
                    ORDER BY updated_at ASC
                    "#,
                )
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    /// Gets locally-modified rows awaiting upload, oldest first.
    pub async fn pending(&self, owner_id: &str, limit: u32) -> DbResult<Vec<CardProgress>> {
        let rows = sqlx::query_as::<_, CardProgress>(
            r#"
            SELECT id, owner_id, card_id, learning_state, interval_days, ease_factor,
                   repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
            FROM card_progress
            WHERE owner_id = ?1 AND sync_status = 'pending'
            ORDER BY updated_at ASC
            LIMIT ?2
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks a row as acknowledged by the server.
    ///
    /// The `not_after` guard keeps a grade recorded between upload and
    /// acknowledgement pending: only the version that was actually sent is
    /// marked synced.
    pub async fn mark_synced(&self, id: &str, not_after: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE card_progress SET sync_status = 'synced'
            WHERE id = ?1 AND sync_status = 'pending' AND updated_at <= ?2
            "#,
        )
        .bind(id)
        .bind(not_after)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tombstones every live progress row of a deleted card.
    ///
    /// ## When To Call
    /// By the card CRUD collaborator right after soft-deleting the card,
    /// so the deletion propagates through sync as data.
    pub async fn soft_delete_for_card(&self, card_id: &str, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE card_progress SET
                deleted_at = ?2,
                updated_at = ?2,
                sync_status = 'pending'
            WHERE card_id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(card_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Upsert within an open transaction (shared by the public write paths).
async fn upsert_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    progress: &CardProgress,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO card_progress (
            id, owner_id, card_id, learning_state, interval_days, ease_factor,
            repetitions, next_review_at, created_at, updated_at, deleted_at, sync_status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT (id) DO UPDATE SET
            owner_id = excluded.owner_id,
            card_id = excluded.card_id,
            learning_state = excluded.learning_state,
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            repetitions = excluded.repetitions,
            next_review_at = excluded.next_review_at,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            deleted_at = excluded.deleted_at,
            sync_status = excluded.sync_status
        "#,
    )
    .bind(&progress.id)
    .bind(&progress.owner_id)
    .bind(&progress.card_id)
    .bind(progress.learning_state)
    .bind(progress.interval_days)
    .bind(progress.ease_factor)
    .bind(progress.repetitions)
    .bind(progress.next_review_at)
    .bind(progress.created_at)
    .bind(progress.updated_at)
    .bind(progress.deleted_at)
    .bind(progress.sync_status)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
