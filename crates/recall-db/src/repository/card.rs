//! # Card Repository
//!
//! Sync-facing database operations for cards. A card's owner is derived
//! through its parent deck, which is what the push-side ownership check
//! queries here.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use recall_core::{Card, SyncStatus};

/// Repository for card database operations.
#[derive(Debug, Clone)]
pub struct CardRepository {
    pool: SqlitePool,
}

impl CardRepository {
    /// Creates a new CardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CardRepository { pool }
    }

    /// Gets a card by ID, tombstoned or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, deck_id, front, back,
                   created_at, updated_at, deleted_at, sync_status
            FROM cards
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Returns the owner of a card via its parent deck, if both exist.
    pub async fn owner_of(&self, id: &str) -> DbResult<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>(
            r#"
            SELECT d.owner_id
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE c.id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    /// Upserts a card by ID, preserving every field as given.
    pub async fn upsert(&self, card: &Card) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cards (
                id, deck_id, front, back,
                created_at, updated_at, deleted_at, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (id) DO UPDATE SET
                deck_id = excluded.deck_id,
                front = excluded.front,
                back = excluded.back,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                sync_status = excluded.sync_status
            "#,
        )
        .bind(&card.id)
        .bind(&card.deck_id)
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.created_at)
        .bind(card.updated_at)
        .bind(card.deleted_at)
        .bind(card.sync_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a card arriving from a pull response (last-write-wins).
    pub async fn apply_remote(&self, remote: &Card) -> DbResult<bool> {
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

    /// Gets every card of an owner changed after `since` (tombstones
    /// included), or all cards when `since` is absent. Ownership resolves
    /// through the parent deck.
    pub async fn changed_since(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Card>> {
        let rows = match since {
            Some(since) => {
                sqlx::query_as::<_, Card>(
                    r#"
                    SELECT c.id, c.deck_id, c.front, c.back,
                           c.created_at, c.updated_at, c.deleted_at, c.sync_status
                    FROM cards c
                    JOIN decks d ON d.id = c.deck_id
                    WHERE d.owner_id = ?1 AND c.updated_at > ?2
                    ORDER BY c.updated_at ASC
                    "#,
                )
                .bind(owner_id)
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Card>(
                    r#"
                    SELECT c.id, c.deck_id, c.front, c.back,
                           c.created_at, c.updated_at, c.deleted_at, c.sync_status
                    FROM cards c
                    JOIN decks d ON d.id = c.deck_id
                    WHERE d.owner_id = ?1
                    ORDER BY c.updated_at ASC
                    "#,
                )
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    /// Gets locally-modified cards awaiting upload, oldest first.
    pub async fn pending(&self, owner_id: &str, limit: u32) -> DbResult<Vec<Card>> {
        let rows = sqlx::query_as::<_, Card>(
            r#"
            SELECT c.id, c.deck_id, c.front, c.back,
                   c.created_at, c.updated_at, c.deleted_at, c.sync_status
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE d.owner_id = ?1 AND c.sync_status = 'pending'
            ORDER BY c.updated_at ASC
            LIMIT ?2
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks a card as acknowledged by the server (guarded by write stamp).
    pub async fn mark_synced(&self, id: &str, not_after: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cards SET sync_status = 'synced'
            WHERE id = ?1 AND sync_status = 'pending' AND updated_at <= ?2
            "#,
        )
        .bind(id)
        .bind(not_after)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a card so the deletion propagates through sync.
    ///
    /// The caller is expected to tombstone the card's progress rows as well
    /// (see `ProgressRepository::soft_delete_for_card`).
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cards SET
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
