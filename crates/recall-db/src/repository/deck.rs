//! # Deck Repository
//!
//! Sync-facing database operations for decks. Deck CRUD UI lives outside
//! the core; this repository exists so the sync engine can reconcile decks
//! alongside the progress rows that reference them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use recall_core::{Deck, SyncStatus};

/// Repository for deck database operations.
#[derive(Debug, Clone)]
pub struct DeckRepository {
    pool: SqlitePool,
}

impl DeckRepository {
    /// Creates a new DeckRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeckRepository { pool }
    }

    /// Gets a deck by ID, tombstoned or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Deck>> {
        let deck = sqlx::query_as::<_, Deck>(
            r#"
            SELECT id, owner_id, folder_id, name, description,
                   created_at, updated_at, deleted_at, sync_status
            FROM decks
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deck)
    }

    /// Returns the owner of a deck, if the deck exists.
    ///
    /// ## Usage
    /// Ownership verification during push processing.
    pub async fn owner_of(&self, id: &str) -> DbResult<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>("SELECT owner_id FROM decks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    /// Upserts a deck by ID, preserving every field as given.
    pub async fn upsert(&self, deck: &Deck) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO decks (
                id, owner_id, folder_id, name, description,
                created_at, updated_at, deleted_at, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = excluded.owner_id,
                folder_id = excluded.folder_id,
                name = excluded.name,
                description = excluded.description,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                sync_status = excluded.sync_status
            "#,
        )
        .bind(&deck.id)
        .bind(&deck.owner_id)
        .bind(&deck.folder_id)
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(deck.created_at)
        .bind(deck.updated_at)
        .bind(deck.deleted_at)
        .bind(deck.sync_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a deck arriving from a pull response (last-write-wins).
    ///
    /// ## Returns
    /// `true` if the remote copy was written, `false` if the local row won.
    pub async fn apply_remote(&self, remote: &Deck) -> DbResult<bool> {
        if let Some(local) = self.get(&remote.id).await? {
            if local.updated_at >= remote.updated_at {
                return Ok(false);
            }
        }

        let mut accepted = remote.clone();
        accepted.sync_status = SyncStatus::Synced;
        self.upsert(&accepted).await?;
        Ok(true)
    }

    /// Gets every deck of an owner changed after `since` (tombstones
    /// included), or all decks when `since` is absent.
    pub async fn changed_since(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Deck>> {
        let rows = match since {
            Some(since) => {
                sqlx::query_as::<_, Deck>(
                    r#"
                    SELECT id, owner_id, folder_id, name, description,
                           created_at, updated_at, deleted_at, sync_status
                    FROM decks
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
                sqlx::query_as::<_, Deck>(
                    r#"
                    SELECT id, owner_id, folder_id, name, description,
                           created_at, updated_at, deleted_at, sync_status
                    FROM decks
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

    /// Gets locally-modified decks awaiting upload, oldest first.
    pub async fn pending(&self, owner_id: &str, limit: u32) -> DbResult<Vec<Deck>> {
        let rows = sqlx::query_as::<_, Deck>(
            r#"
            SELECT id, owner_id, folder_id, name, description,
                   created_at, updated_at, deleted_at, sync_status
            FROM decks
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

    /// Marks a deck as acknowledged by the server (guarded by write stamp).
    pub async fn mark_synced(&self, id: &str, not_after: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE decks SET sync_status = 'synced'
            WHERE id = ?1 AND sync_status = 'pending' AND updated_at <= ?2
            "#,
        )
        .bind(id)
        .bind(not_after)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a deck so the deletion propagates through sync.
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE decks SET
                deleted_at = ?2,
                updated_at = ?2,
                sync_status = 'pending'
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
