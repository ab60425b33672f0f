//! # Sync Cursor Repository
//!
//! Per-owner pull cursor for the client store.
//!
//! The cursor holds the server-issued `serverTime` of the last fully
//! applied pull - never the client's own clock, so clock skew cannot cause
//! a false "nothing changed" or an infinite resync loop. The sync engine
//! writes it only after a pull response has been applied completely;
//! a cancelled or failed pull leaves it untouched.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Repository for sync cursor operations.
#[derive(Debug, Clone)]
pub struct CursorRepository {
    pool: SqlitePool,
}

impl CursorRepository {
    /// Creates a new CursorRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CursorRepository { pool }
    }

    /// Gets the last sync time for an owner. None = never synced
    /// (the next pull fetches the complete dataset).
    pub async fn get(&self, owner_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let cursor: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT last_sync_time FROM sync_cursors WHERE owner_id = ?1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor.flatten())
    }

    /// Advances the cursor to a server-issued timestamp.
    pub async fn set(&self, owner_id: &str, server_time: DateTime<Utc>) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sync_cursors (owner_id, last_sync_time, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (owner_id) DO UPDATE SET
                last_sync_time = excluded.last_sync_time,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(server_time)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clears the cursor, forcing the next pull to fetch everything.
    pub async fn clear(&self, owner_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM sync_cursors WHERE owner_id = ?1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
