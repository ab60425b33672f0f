//! # Review Log Repository
//!
//! Persistence for the append-only audit of grading events.
//!
//! ## Upload Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Review Log Sync Lifecycle                            │
//! │                                                                         │
//! │  record_review ──► INSERT (sync_status = 'pending')                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sync push ──► uploads pending entries                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Server ack ──► mark_synced (retries never re-upload)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Client keeps the entry forever; the server may prune entries past     │
//! │  the retention window (prune_synced)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use recall_core::{ReviewLogEntry, SyncStatus};

/// Repository for review log operations.
#[derive(Debug, Clone)]
pub struct ReviewLogRepository {
    pool: SqlitePool,
}

const COLUMNS: &str = "id, card_progress_id, owner_id, grade, time_taken_seconds, \
     previous_interval, new_interval, previous_ease_factor, new_ease_factor, \
     resulting_state, reviewed_at, updated_at, deleted_at, sync_status";

impl ReviewLogRepository {
    /// Creates a new ReviewLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReviewLogRepository { pool }
    }

    /// Gets an entry by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<ReviewLogEntry>> {
        let entry = sqlx::query_as::<_, ReviewLogEntry>(&format!(
            "SELECT {COLUMNS} FROM review_log WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Inserts or re-inserts an entry by ID.
    ///
    /// Entries are immutable, so the upsert exists purely to make retried
    /// pushes idempotent: the second arrival of the same entry is a no-op
    /// rewrite of identical content.
    pub async fn upsert(&self, entry: &ReviewLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO review_log (
                id, card_progress_id, owner_id, grade, time_taken_seconds,
                previous_interval, new_interval, previous_ease_factor, new_ease_factor,
                resulting_state, reviewed_at, updated_at, deleted_at, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT (id) DO UPDATE SET
                sync_status = excluded.sync_status
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.card_progress_id)
        .bind(&entry.owner_id)
        .bind(entry.grade)
        .bind(entry.time_taken_seconds)
        .bind(entry.previous_interval)
        .bind(entry.new_interval)
        .bind(entry.previous_ease_factor)
        .bind(entry.new_ease_factor)
        .bind(entry.resulting_state)
        .bind(entry.reviewed_at)
        .bind(entry.updated_at)
        .bind(entry.deleted_at)
        .bind(entry.sync_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies an entry arriving from a pull response.
    ///
    /// Entries never change after creation, so an already-present id wins
    /// and nothing is overwritten.
    pub async fn apply_remote(&self, remote: &ReviewLogEntry) -> DbResult<bool> {
        if self.get(&remote.id).await?.is_some() {
            return Ok(false);
        }

        let mut accepted = remote.clone();
        accepted.sync_status = SyncStatus::Synced;
        self.upsert(&accepted).await?;
        Ok(true)
    }

    /// Gets every entry of an owner changed after `since`, or all entries
    /// when `since` is absent.
    pub async fn changed_since(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<ReviewLogEntry>> {
        let rows = match since {
            Some(since) => {
                sqlx::query_as::<_, ReviewLogEntry>(&format!(
                    r#"
                    SELECT {COLUMNS} FROM review_log
                    WHERE owner_id = ?1 AND updated_at > ?2
                    ORDER BY updated_at ASC
                    "#
                ))
                .bind(owner_id)
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ReviewLogEntry>(&format!(
                    r#"
                    SELECT {COLUMNS} FROM review_log
                    WHERE owner_id = ?1
                    ORDER BY updated_at ASC
                    "#
                ))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    /// Gets entries awaiting upload, oldest first.
    pub async fn pending(&self, owner_id: &str, limit: u32) -> DbResult<Vec<ReviewLogEntry>> {
        let rows = sqlx::query_as::<_, ReviewLogEntry>(&format!(
            r#"
            SELECT {COLUMNS} FROM review_log
            WHERE owner_id = ?1 AND sync_status = 'pending'
            ORDER BY reviewed_at ASC
            LIMIT ?2
            "#
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks an entry as acknowledged by the server.
    ///
    /// Entries are immutable, so no write-stamp guard is needed here.
    pub async fn mark_synced(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE review_log SET sync_status = 'synced' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts pending entries (sync diagnostics).
    pub async fn count_pending(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM review_log WHERE owner_id = ?1 AND sync_status = 'pending'",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts all entries of an owner.
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM review_log WHERE owner_id = ?1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes entries reviewed before the retention cutoff.
    ///
    /// ## Server-Side Only
    /// Clients never destroy review log entries. The server runs this
    /// after entries have been uploaded and the retention window passed.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn prune_synced(&self, older_than: DateTime<Utc>) -> DbResult<u64> {
        debug!(older_than = %older_than, "Pruning review log");

        let result = sqlx::query(
            "DELETE FROM review_log WHERE sync_status = 'synced' AND reviewed_at < ?1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
