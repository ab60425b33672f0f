//! # Folder Repository
//!
//! Sync-facing database operations for folders.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use recall_core::{Folder, SyncStatus};

/// Repository for folder database operations.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: SqlitePool,
}

impl FolderRepository {
    /// Creates a new FolderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FolderRepository { pool }
    }

    /// Gets a folder by ID, tombstoned or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            r#"
            SELECT id, owner_id, name, parent_id,
                   created_at, updated_at, deleted_at, sync_status
            FROM folders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(folder)
    }

    /// Returns the owner of a folder, if the folder exists.
    pub async fn owner_of(&self, id: &str) -> DbResult<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>("SELECT owner_id FROM folders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    /// Upserts a folder by ID, preserving every field as given.
    pub async fn upsert(&self, folder: &Folder) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO folders (
                id, owner_id, name, parent_id,
                created_at, updated_at, deleted_at, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                parent_id = excluded.parent_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at,
                sync_status = excluded.sync_status
            "#,
        )
        .bind(&folder.id)
        .bind(&folder.owner_id)
        .bind(&folder.name)
        .bind(&folder.parent_id)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .bind(folder.deleted_at)
        .bind(folder.sync_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a folder arriving from a pull response (last-write-wins).
    pub async fn apply_remote(&self, remote: &Folder) -> DbResult<bool> {
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

    /// Gets every folder of an owner changed after `since` (tombstones
    /// included), or all folders when `since` is absent.
    pub async fn changed_since(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Folder>> {
        let rows = match since {
            Some(since) => {
                sqlx::query_as::<_, Folder>(
                    r#"
                    SELECT id, owner_id, name, parent_id,
                           created_at, updated_at, deleted_at, sync_status
                    FROM folders
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
                sqlx::query_as::<_, Folder>(
                    r#"
                    SELECT id, owner_id, name, parent_id,
                           created_at, updated_at, deleted_at, sync_status
                    FROM folders
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

    /// Gets locally-modified folders awaiting upload, oldest first.
    pub async fn pending(&self, owner_id: &str, limit: u32) -> DbResult<Vec<Folder>> {
        let rows = sqlx::query_as::<_, Folder>(
            r#"
            SELECT id, owner_id, name, parent_id,
                   created_at, updated_at, deleted_at, sync_status
            FROM folders
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

    /// Marks a folder as acknowledged by the server (guarded by write stamp).
    pub async fn mark_synced(&self, id: &str, not_after: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE folders SET sync_status = 'synced'
            WHERE id = ?1 AND sync_status = 'pending' AND updated_at <= ?2
            "#,
        )
        .bind(id)
        .bind(not_after)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a folder so the deletion propagates through sync.
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE folders SET
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
