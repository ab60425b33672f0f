//! # Client-Side Sync Engine
//!
//! Drives the pull/push rounds against the local store.
//!
//! ## Cursor Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Sync Round (sync_once)                          │
//! │                                                                         │
//! │  PUSH                                                                  │
//! │  ────                                                                  │
//! │  1. Collect rows with sync_status = 'pending' (all entity kinds)       │
//! │  2. Upload as one batch                                                │
//! │  3. Mark rows synced - but ONLY the versions that were sent            │
//! │     (write-stamp guard) and ONLY ids the server did not reject         │
//! │                                                                         │
//! │  PULL                                                                  │
//! │  ────                                                                  │
//! │  4. Read cursor (server-issued, None = first sync)                     │
//! │  5. Download the delta                                                 │
//! │  6. Apply every entity (last-write-wins, tombstones included)          │
//! │  7. Advance cursor to envelope.serverTime - ONLY after step 6          │
//! │     completed. A failed or cancelled round leaves the cursor and       │
//! │     all pending flags exactly as they were: sync is resumable,         │
//! │     not transactional across the round trip.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use recall_db::Database;

use crate::error::SyncResult;
use crate::protocol::{
    CardDto, CardProgressDto, DeckDto, FolderDto, PushBatch, StudyLogDto, SyncEnvelope,
};
use crate::transport::SyncTransport;

// =============================================================================
// Summaries
// =============================================================================

/// What one pull accomplished.
#[derive(Debug, Clone, Copy)]
pub struct PullSummary {
    /// Entities received in the envelope.
    pub received: usize,
    /// Entities actually written (the rest lost last-write-wins locally).
    pub applied: usize,
    /// The new cursor value.
    pub server_time: DateTime<Utc>,
}

/// What one push accomplished.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushSummary {
    /// Entities uploaded.
    pub uploaded: usize,
    /// Entities the server rejected (stay pending for manual resolution).
    pub rejected: usize,
}

/// What one full round (push then pull) accomplished.
#[derive(Debug, Clone, Copy)]
pub struct SyncSummary {
    pub push: PushSummary,
    pub pull: PullSummary,
}

// =============================================================================
// Sync Engine
// =============================================================================

/// The client half of the sync protocol, generic over the transport.
pub struct SyncEngine<T: SyncTransport> {
    db: Database,
    transport: T,
    owner_id: String,
    batch_size: u32,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Creates a sync engine for one learner's local store.
    pub fn new(db: Database, transport: T, owner_id: impl Into<String>) -> Self {
        SyncEngine {
            db,
            transport,
            owner_id: owner_id.into(),
            batch_size: 500,
        }
    }

    /// Overrides the per-round upload batch size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The learner this engine syncs for.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Runs one full round: push local changes, then pull remote ones.
    ///
    /// Push-before-pull keeps the round idempotent-friendly: our own
    /// uploads come straight back in the pull and are no-op applies.
    pub async fn sync_once(&self) -> SyncResult<SyncSummary> {
        let push = self.push_once().await?;
        let pull = self.pull_once().await?;

        info!(
            owner_id = %self.owner_id,
            uploaded = push.uploaded,
            rejected = push.rejected,
            received = pull.received,
            applied = pull.applied,
            "Sync round complete"
        );

        Ok(SyncSummary { push, pull })
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Uploads every locally-modified row and marks acknowledged rows
    /// synced. Safe to retry: unacknowledged rows stay pending, and the
    /// server upserts by id.
    pub async fn push_once(&self) -> SyncResult<PushSummary> {
        let owner = self.owner_id.as_str();

        let folders = self.db.folders().pending(owner, self.batch_size).await?;
        let decks = self.db.decks().pending(owner, self.batch_size).await?;
        let cards = self.db.cards().pending(owner, self.batch_size).await?;
        let progress = self.db.progress().pending(owner, self.batch_size).await?;
        let logs = self.db.review_log().pending(owner, self.batch_size).await?;

        let batch = PushBatch {
            folders: folders.iter().map(FolderDto::from_record).collect(),
            decks: decks.iter().map(DeckDto::from_record).collect(),
            cards: cards.iter().map(CardDto::from_record).collect(),
            card_progress: progress.iter().map(CardProgressDto::from_record).collect(),
            study_logs: logs.iter().map(StudyLogDto::from_record).collect(),
        };

        if batch.is_empty() {
            debug!(owner_id = %owner, "Nothing pending, skipping push");
            return Ok(PushSummary::default());
        }

        let uploaded = batch.len();
        let outcome = self.transport.push(owner, batch).await?;

        let rejected_ids: HashSet<&str> = outcome
            .rejected
            .iter()
            .filter_map(|r| r.id.as_deref())
            .collect();

        // Acknowledged = sent minus rejected. The write-stamp guard in
        // mark_synced keeps any row graded mid-flight pending.
        for folder in &folders {
            if !rejected_ids.contains(folder.id.as_str()) {
                self.db
                    .folders()
                    .mark_synced(&folder.id, folder.updated_at)
                    .await?;
            }
        }
        for deck in &decks {
            if !rejected_ids.contains(deck.id.as_str()) {
                self.db.decks().mark_synced(&deck.id, deck.updated_at).await?;
            }
        }
        for card in &cards {
            if !rejected_ids.contains(card.id.as_str()) {
                self.db.cards().mark_synced(&card.id, card.updated_at).await?;
            }
        }
        for row in &progress {
            if !rejected_ids.contains(row.id.as_str()) {
                self.db.progress().mark_synced(&row.id, row.updated_at).await?;
            }
        }
        for entry in &logs {
            if !rejected_ids.contains(entry.id.as_str()) {
                self.db.review_log().mark_synced(&entry.id).await?;
            }
        }

        Ok(PushSummary {
            uploaded,
            rejected: outcome.rejected.len(),
        })
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Downloads and applies the delta since the stored cursor, then - and
    /// only then - advances the cursor to the server's clock snapshot.
    pub async fn pull_once(&self) -> SyncResult<PullSummary> {
        let owner = self.owner_id.as_str();

        let since = self.db.cursors().get(owner).await?;
        let envelope = self.transport.pull(owner, since).await?;

        let received = envelope.len();
        let applied = self.apply_envelope(&envelope).await?;

        // The cursor is the server's clock, never ours: skew cannot cause
        // a false "nothing changed" or an endless resync
        self.db.cursors().set(owner, envelope.server_time).await?;

        debug!(
            owner_id = %owner,
            since = ?since,
            received,
            applied,
            "Pull applied"
        );

        Ok(PullSummary {
            received,
            applied,
            server_time: envelope.server_time,
        })
    }

    /// Applies a pulled envelope entity-by-entity, parents before
    /// children. Tombstones are applied like any other write, which is
    /// how deletions propagate.
    async fn apply_envelope(&self, envelope: &SyncEnvelope) -> SyncResult<usize> {
        let owner = self.owner_id.as_str();
        let mut applied = 0;

        for dto in &envelope.folders {
            let record = dto.clone().into_record(owner)?;
            if self.db.folders().apply_remote(&record).await? {
                applied += 1;
            }
        }

        for dto in &envelope.decks {
            let record = dto.clone().into_record(owner)?;
            if self.db.decks().apply_remote(&record).await? {
                applied += 1;
            }
        }

        for dto in &envelope.cards {
            let record = dto.clone().into_record()?;
            if self.db.cards().apply_remote(&record).await? {
                applied += 1;
            }
        }

        for dto in &envelope.card_progress {
            let record = dto.clone().into_record(owner)?;
            if self.db.progress().apply_remote(&record).await? {
                applied += 1;
            }
        }

        for dto in &envelope.study_logs {
            let record = dto.clone().into_record(owner)?;
            if self.db.review_log().apply_remote(&record).await? {
                applied += 1;
            }
        }

        Ok(applied)
    }
}

impl<T: SyncTransport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("owner_id", &self.owner_id)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
