//! # Server-Side Sync Service
//!
//! The authoritative half of the sync protocol: delta pulls and
//! partial-success pushes against the server store.
//!
//! ## Push Processing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Push Batch Processing                              │
//! │                                                                         │
//! │  POST sync?owner=o1 { folders[], decks[], cards[], ... }               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Collections process parents-first:                                    │
//! │  folders ──► decks ──► cards ──► cardProgress ──► studyLogs            │
//! │  (a card and its new deck may share one batch)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Per entity:                                                           │
//! │  1. id absent?            ──► mint UUID, echo entity in response       │
//! │  2. parent owned by o1?   ──► no: REJECT entity, continue batch        │
//! │  3. upsert by id          ──► unconditional overwrite (LWW:            │
//! │                               whichever side pushes later wins)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  { serverTime, <minted echoes>, rejected[] }                           │
//! │                                                                         │
//! │  IDEMPOTENCY: retrying an identical batch re-upserts identical         │
//! │  content under the same ids - the stored rows do not change.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use recall_db::Database;

use crate::error::SyncResult;
use crate::protocol::{
    CardDto, CardProgressDto, DeckDto, FolderDto, PushBatch, PushOutcome, RejectedEntity,
    StudyLogDto, SyncEnvelope, Syncable,
};

// =============================================================================
// Sync Service
// =============================================================================

/// The server side of the sync protocol.
///
/// Transport-agnostic: the HTTP server binds it to routes, and the
/// in-process loopback transport drives it directly in tests.
#[derive(Debug, Clone)]
pub struct SyncService {
    db: Database,
}

impl SyncService {
    /// Creates a sync service over the server store.
    pub fn new(db: Database) -> Self {
        SyncService { db }
    }

    /// The server store (maintenance jobs, diagnostics).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The authoritative clock snapshot handed to clients as their cursor.
    pub fn server_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Returns every entity of `owner_id` changed after `since`, tombstones
    /// included. An absent `since` returns the complete dataset.
    ///
    /// The clock snapshot is taken BEFORE the queries: an entity pushed
    /// while the pull is running may be delivered twice (here and on the
    /// next delta), but never lost.
    pub async fn pull(
        &self,
        owner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncEnvelope> {
        let server_time = self.server_time();

        let folders = self.db.folders().changed_since(owner_id, since).await?;
        let decks = self.db.decks().changed_since(owner_id, since).await?;
        let cards = self.db.cards().changed_since(owner_id, since).await?;
        let card_progress = self.db.progress().changed_since(owner_id, since).await?;
        let study_logs = self.db.review_log().changed_since(owner_id, since).await?;

        let envelope = SyncEnvelope {
            server_time,
            folders: folders.iter().map(FolderDto::from_record).collect(),
            decks: decks.iter().map(DeckDto::from_record).collect(),
            cards: cards.iter().map(CardDto::from_record).collect(),
            card_progress: card_progress
                .iter()
                .map(CardProgressDto::from_record)
                .collect(),
            study_logs: study_logs.iter().map(StudyLogDto::from_record).collect(),
        };

        debug!(
            owner_id = %owner_id,
            since = ?since,
            entities = envelope.len(),
            "Serving pull"
        );

        Ok(envelope)
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Applies a push batch with partial-success semantics.
    ///
    /// Each entity is verified and upserted independently; a rejected
    /// entity never fails the batch. The response mirrors the pull
    /// envelope (`serverTime` plus echoes of entities that received
    /// server-minted ids) and reports the rejections.
    pub async fn push(&self, owner_id: &str, batch: PushBatch) -> SyncResult<PushOutcome> {
        let total = batch.len();
        let mut outcome = PushOutcome {
            envelope: SyncEnvelope::empty(self.server_time()),
            rejected: Vec::new(),
        };

        // Parents before children, so one batch can carry a new deck and
        // its cards together
        for folder in batch.folders {
            match self.apply_folder(owner_id, folder).await {
                Ok(Some(echo)) => outcome.envelope.folders.push(echo),
                Ok(None) => {}
                Err(rejection) => outcome.rejected.push(rejection),
            }
        }

        for deck in batch.decks {
            match self.apply_deck(owner_id, deck).await {
                Ok(Some(echo)) => outcome.envelope.decks.push(echo),
                Ok(None) => {}
                Err(rejection) => outcome.rejected.push(rejection),
            }
        }

        for card in batch.cards {
            match self.apply_card(owner_id, card).await {
                Ok(Some(echo)) => outcome.envelope.cards.push(echo),
                Ok(None) => {}
                Err(rejection) => outcome.rejected.push(rejection),
            }
        }

        for progress in batch.card_progress {
            match self.apply_progress(owner_id, progress).await {
                Ok(Some(echo)) => outcome.envelope.card_progress.push(echo),
                Ok(None) => {}
                Err(rejection) => outcome.rejected.push(rejection),
            }
        }

        for log in batch.study_logs {
            match self.apply_study_log(owner_id, log).await {
                Ok(Some(echo)) => outcome.envelope.study_logs.push(echo),
                Ok(None) => {}
                Err(rejection) => outcome.rejected.push(rejection),
            }
        }

        for rejection in &outcome.rejected {
            warn!(
                owner_id = %owner_id,
                entity_type = %rejection.entity_type,
                id = ?rejection.id,
                reason = %rejection.reason,
                "Rejected pushed entity"
            );
        }

        info!(
            owner_id = %owner_id,
            received = total,
            rejected = outcome.rejected.len(),
            "Push batch processed"
        );

        Ok(outcome)
    }

    /// Mints an id for a create, returning whether one was minted.
    fn mint_id<E: Syncable>(entity: &mut E) -> bool {
        if entity.entity_id().is_none() {
            entity.set_entity_id(Uuid::new_v4().to_string());
            true
        } else {
            false
        }
    }

    async fn apply_folder(
        &self,
        owner_id: &str,
        mut dto: FolderDto,
    ) -> Result<Option<FolderDto>, RejectedEntity> {
        let minted = Self::mint_id(&mut dto);
        let id = dto.entity_id().unwrap_or_default().to_string();

        // Updating an id that belongs to another learner is an ownership
        // violation; an unknown id is a create-with-explicit-id
        let existing_owner = self
            .db
            .folders()
            .owner_of(&id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;
        if matches!(existing_owner, Some(ref owner) if owner != owner_id) {
            return Err(reject(&dto, "folder belongs to another owner"));
        }

        if let Some(parent_id) = &dto.parent_id {
            let parent_owner = self
                .db
                .folders()
                .owner_of(parent_id)
                .await
                .map_err(|e| reject(&dto, &e.to_string()))?;
            if matches!(parent_owner, Some(ref owner) if owner != owner_id) {
                return Err(reject(&dto, "parent folder belongs to another owner"));
            }
        }

        let record = dto
            .clone()
            .into_record(owner_id)
            .map_err(|e| reject(&dto, &e.to_string()))?;

        self.db
            .folders()
            .upsert(&record)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;

        Ok(minted.then_some(dto))
    }

    async fn apply_deck(
        &self,
        owner_id: &str,
        mut dto: DeckDto,
    ) -> Result<Option<DeckDto>, RejectedEntity> {
        let minted = Self::mint_id(&mut dto);
        let id = dto.entity_id().unwrap_or_default().to_string();

        let existing_owner = self
            .db
            .decks()
            .owner_of(&id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;
        if matches!(existing_owner, Some(ref owner) if owner != owner_id) {
            return Err(reject(&dto, "deck belongs to another owner"));
        }

        if let Some(folder_id) = &dto.folder_id {
            let folder_owner = self
                .db
                .folders()
                .owner_of(folder_id)
                .await
                .map_err(|e| reject(&dto, &e.to_string()))?;
            if matches!(folder_owner, Some(ref owner) if owner != owner_id) {
                return Err(reject(&dto, "parent folder belongs to another owner"));
            }
        }

        let record = dto
            .clone()
            .into_record(owner_id)
            .map_err(|e| reject(&dto, &e.to_string()))?;

        self.db
            .decks()
            .upsert(&record)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;

        Ok(minted.then_some(dto))
    }

    async fn apply_card(
        &self,
        owner_id: &str,
        mut dto: CardDto,
    ) -> Result<Option<CardDto>, RejectedEntity> {
        let minted = Self::mint_id(&mut dto);

        // A card's parent deck must already exist server-side and be owned
        // by the caller. Pushing the deck first (same batch or a prior
        // round) is the caller's responsibility.
        let deck_owner = self
            .db
            .decks()
            .owner_of(&dto.deck_id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;
        match deck_owner {
            None => return Err(reject(&dto, "parent deck not found")),
            Some(deck_owner) if deck_owner != owner_id => {
                return Err(reject(&dto, "parent deck belongs to another owner"))
            }
            Some(_) => {}
        }

        let record = dto
            .clone()
            .into_record()
            .map_err(|e| reject(&dto, &e.to_string()))?;

        self.db
            .cards()
            .upsert(&record)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;

        Ok(minted.then_some(dto))
    }

    async fn apply_progress(
        &self,
        owner_id: &str,
        mut dto: CardProgressDto,
    ) -> Result<Option<CardProgressDto>, RejectedEntity> {
        let minted = Self::mint_id(&mut dto);

        let card_owner = self
            .db
            .cards()
            .owner_of(&dto.card_id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;
        match card_owner {
            None => return Err(reject(&dto, "card not found")),
            Some(card_owner) if card_owner != owner_id => {
                return Err(reject(&dto, "card belongs to another owner"))
            }
            Some(_) => {}
        }

        // Updating another learner's progress row is an ownership violation
        let id = dto.entity_id().unwrap_or_default().to_string();
        if let Some(existing) = self
            .db
            .progress()
            .get_by_id(&id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?
        {
            if existing.owner_id != owner_id {
                return Err(reject(&dto, "progress belongs to another owner"));
            }
        }

        let record = dto
            .clone()
            .into_record(owner_id)
            .map_err(|e| reject(&dto, &e.to_string()))?;

        self.db
            .progress()
            .apply_pushed(&record)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;

        Ok(minted.then_some(dto))
    }

    async fn apply_study_log(
        &self,
        owner_id: &str,
        mut dto: StudyLogDto,
    ) -> Result<Option<StudyLogDto>, RejectedEntity> {
        let minted = Self::mint_id(&mut dto);

        match self
            .db
            .progress()
            .get_by_id(&dto.card_progress_id)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?
        {
            None => return Err(reject(&dto, "progress row not found")),
            Some(progress) if progress.owner_id != owner_id => {
                return Err(reject(&dto, "progress belongs to another owner"))
            }
            Some(_) => {}
        }

        let record = dto
            .clone()
            .into_record(owner_id)
            .map_err(|e| reject(&dto, &e.to_string()))?;

        self.db
            .review_log()
            .upsert(&record)
            .await
            .map_err(|e| reject(&dto, &e.to_string()))?;

        Ok(minted.then_some(dto))
    }
}

/// Builds a rejection report entry for a DTO.
fn reject<E: Syncable>(dto: &E, reason: &str) -> RejectedEntity {
    RejectedEntity {
        entity_type: dto.entity_type().to_string(),
        id: dto.entity_id().map(|s| s.to_string()),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use recall_db::DbConfig;
    use recall_core::{Card, Deck, Grade};

    async fn service() -> SyncService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SyncService::new(db)
    }

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn deck_dto(id: Option<&str>, name: &str, at: DateTime<Utc>) -> DeckDto {
        DeckDto {
            id: id.map(|s| s.to_string()),
            folder_id: None,
            name: name.to_string(),
            description: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    fn card_dto(id: Option<&str>, deck_id: &str, at: DateTime<Utc>) -> CardDto {
        CardDto {
            id: id.map(|s| s.to_string()),
            deck_id: deck_id.to_string(),
            front: "hola".into(),
            back: "hello".into(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_push_mints_ids_for_creates() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");

        let batch = PushBatch {
            decks: vec![deck_dto(None, "Spanish", now)],
            ..PushBatch::default()
        };

        let outcome = service.push("owner-1", batch).await.unwrap();

        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.envelope.decks.len(), 1);
        let minted_id = outcome.envelope.decks[0].id.clone().unwrap();

        let stored = service.db().decks().get(&minted_id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Spanish");
        assert_eq!(stored.owner_id, "owner-1");
    }

    #[tokio::test]
    async fn test_push_same_batch_carries_deck_and_cards() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");
        let deck = Deck::new("owner-1", "Spanish", now);

        let batch = PushBatch {
            decks: vec![DeckDto::from_record(&deck)],
            cards: vec![card_dto(Some("c-1"), &deck.id, now)],
            ..PushBatch::default()
        };

        let outcome = service.push("owner-1", batch).await.unwrap();
        assert!(outcome.rejected.is_empty());
        assert!(service.db().cards().get("c-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_push_rejects_foreign_parent_but_continues() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");

        // owner-2's deck already on the server
        let foreign_deck = Deck::new("owner-2", "Theirs", now);
        service.db().decks().upsert(&foreign_deck).await.unwrap();

        // owner-1 pushes one bad card (foreign deck) and one good deck
        let batch = PushBatch {
            decks: vec![deck_dto(Some("d-mine"), "Mine", now)],
            cards: vec![card_dto(Some("c-bad"), &foreign_deck.id, now)],
            ..PushBatch::default()
        };

        let outcome = service.push("owner-1", batch).await.unwrap();

        // Partial success: the card is rejected, the deck still lands
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].entity_type, "CARD");
        assert_eq!(outcome.rejected[0].id.as_deref(), Some("c-bad"));
        assert!(service.db().cards().get("c-bad").await.unwrap().is_none());
        assert!(service.db().decks().get("d-mine").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_push_rejects_card_without_deck() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");

        let batch = PushBatch {
            cards: vec![card_dto(Some("c-orphan"), "d-missing", now)],
            ..PushBatch::default()
        };

        let outcome = service.push("owner-1", batch).await.unwrap();
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0].reason.contains("not found"));
    }

    #[tokio::test]
    async fn test_push_is_idempotent() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");
        let deck = Deck::new("owner-1", "Spanish", now);

        let batch = PushBatch {
            decks: vec![DeckDto::from_record(&deck)],
            ..PushBatch::default()
        };

        service.push("owner-1", batch.clone()).await.unwrap();
        let first = service.db().decks().get(&deck.id).await.unwrap().unwrap();

        // Retry after a simulated timeout: identical content, same id
        service.push("owner-1", batch).await.unwrap();
        let second = service.db().decks().get(&deck.id).await.unwrap().unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pull_full_then_delta() {
        let service = service().await;
        let t1 = t("2026-03-01T12:00:00Z");
        let t2 = t("2026-03-02T12:00:00Z");

        let deck = Deck::new("owner-1", "Spanish", t1);
        service.db().decks().upsert(&deck).await.unwrap();
        let card = Card::new(&deck.id, "hola", "hello", t1);
        service.db().cards().upsert(&card).await.unwrap();

        // Absent cursor = complete dataset
        let full = service.pull("owner-1", None).await.unwrap();
        assert_eq!(full.decks.len(), 1);
        assert_eq!(full.cards.len(), 1);

        // Nothing changed after t1: delta is empty
        let delta = service.pull("owner-1", Some(t1)).await.unwrap();
        assert!(delta.is_empty());

        // One card modified at t2: only it comes back
        let mut modified = card.clone();
        modified.front = "adios".into();
        modified.updated_at = t2;
        service.db().cards().upsert(&modified).await.unwrap();

        let delta = service.pull("owner-1", Some(t1)).await.unwrap();
        assert_eq!(delta.decks.len(), 0);
        assert_eq!(delta.cards.len(), 1);
        assert_eq!(delta.cards[0].front, "adios");
    }

    #[tokio::test]
    async fn test_pull_server_time_monotone() {
        let service = service().await;
        let since = t("2026-03-01T12:00:00Z");

        let envelope = service.pull("owner-1", Some(since)).await.unwrap();
        assert!(envelope.server_time >= since);
    }

    #[tokio::test]
    async fn test_pull_includes_tombstones() {
        let service = service().await;
        let t1 = t("2026-03-01T12:00:00Z");

        let deck = Deck::new("owner-1", "Spanish", t1);
        service.db().decks().upsert(&deck).await.unwrap();

        let t2 = t1 + Duration::hours(1);
        service.db().decks().soft_delete(&deck.id, t2).await.unwrap();

        // The tombstone appears in the delta with deletedAt populated -
        // deletion travels as data, never as omission
        let delta = service.pull("owner-1", Some(t1)).await.unwrap();
        assert_eq!(delta.decks.len(), 1);
        assert!(delta.decks[0].deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_pull_scopes_to_owner() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");

        service
            .db()
            .decks()
            .upsert(&Deck::new("owner-1", "Mine", now))
            .await
            .unwrap();
        service
            .db()
            .decks()
            .upsert(&Deck::new("owner-2", "Theirs", now))
            .await
            .unwrap();

        let envelope = service.pull("owner-1", None).await.unwrap();
        assert_eq!(envelope.decks.len(), 1);
        assert_eq!(envelope.decks[0].name, "Mine");
    }

    #[tokio::test]
    async fn test_push_study_log_requires_owned_progress() {
        let service = service().await;
        let now = t("2026-03-01T12:00:00Z");

        // owner-2's graded card lives on the server
        let deck = Deck::new("owner-2", "Theirs", now);
        service.db().decks().upsert(&deck).await.unwrap();
        let card = Card::new(&deck.id, "q", "a", now);
        service.db().cards().upsert(&card).await.unwrap();
        let outcome = service
            .db()
            .progress()
            .record_review("owner-2", &card.id, Grade::Good, None, now)
            .await
            .unwrap();

        let batch = PushBatch {
            study_logs: vec![StudyLogDto {
                id: Some("log-1".into()),
                card_progress_id: outcome.progress.id.clone(),
                grade: Grade::Good,
                time_taken_seconds: None,
                previous_interval: 0,
                new_interval: 1,
                previous_ease_factor: 2.5,
                new_ease_factor: 2.5,
                resulting_state: recall_core::LearningState::Reviewing,
                reviewed_at: now,
                updated_at: now,
                deleted_at: None,
            }],
            ..PushBatch::default()
        };

        let outcome = service.push("owner-1", batch).await.unwrap();
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].entity_type, "STUDY_LOG");
    }
}
