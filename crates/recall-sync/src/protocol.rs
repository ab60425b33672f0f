//! # Sync Wire Protocol
//!
//! Message types exchanged between client stores and the sync server.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol Operations                           │
//! │                                                                         │
//! │  PULL (delta download)                                                 │
//! │  ─────────────────────                                                 │
//! │  CLIENT ───► GET sync?owner=o1&since=<cursor>                          │
//! │  SERVER ◄─── { serverTime, folders[], decks[], cards[],               │
//! │               cardProgress[], studyLogs[] }                            │
//! │              (every entity changed after the cursor, tombstones        │
//! │               included; absent cursor = the complete dataset)          │
//! │                                                                         │
//! │  PUSH (delta upload)                                                   │
//! │  ───────────────────                                                   │
//! │  CLIENT ───► POST sync?owner=o1 { folders[], decks[], ... }            │
//! │  SERVER ◄─── { serverTime, <echoes of entities with minted ids>,      │
//! │               rejected: [{entityType, id, reason}] }                   │
//! │              (per-entity partial success: one bad entity never        │
//! │               fails the batch)                                         │
//! │                                                                         │
//! │  TIME (clock-skew diagnostics)                                         │
//! │  ─────────────────────────────                                         │
//! │  CLIENT ───► GET sync/time                                             │
//! │  SERVER ◄─── { serverTime }                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Plain JSON, camelCase fields. All identifiers are opaque strings (never
//! native numeric types) for cross-platform stability; timestamps are
//! RFC3339. An absent/null id on push means "create: server mints the id".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use recall_core::{
    error::validate_scheduling, Card, CardProgress, Deck, Folder, Grade, LearningState,
    ReviewLogEntry, SyncStatus,
};

/// Current protocol version (sent as the `X-Recall-Protocol` header by the
/// HTTP transport).
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Syncable
// =============================================================================

/// The shared surface of every entity the sync engine reconciles.
///
/// Replaces the original's shared base record: envelope handling (id
/// minting, LWW stamps, tombstone checks) goes through this trait while
/// everything entity-specific stays on the concrete DTO types.
pub trait Syncable {
    /// Wire name of the entity kind, e.g. "DECK".
    fn entity_type(&self) -> &'static str;

    /// The entity id. None on push means "create, mint an id".
    fn entity_id(&self) -> Option<&str>;

    /// Assigns a server-minted id.
    fn set_entity_id(&mut self, id: String);

    /// Last-write-wins stamp.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Soft-delete marker.
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Whether this entity is a soft-delete tombstone.
    fn is_tombstone(&self) -> bool {
        self.deleted_at().is_some()
    }
}

macro_rules! impl_syncable {
    ($dto:ty, $kind:expr) => {
        impl Syncable for $dto {
            fn entity_type(&self) -> &'static str {
                $kind
            }
            fn entity_id(&self) -> Option<&str> {
                self.id.as_deref()
            }
            fn set_entity_id(&mut self, id: String) {
                self.id = Some(id);
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
            fn deleted_at(&self) -> Option<DateTime<Utc>> {
                self.deleted_at
            }
        }
    };
}

// =============================================================================
// Entity DTOs
// =============================================================================

/// Folder on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_syncable!(FolderDto, "FOLDER");

impl FolderDto {
    pub fn from_record(folder: &Folder) -> Self {
        FolderDto {
            id: Some(folder.id.clone()),
            name: folder.name.clone(),
            parent_id: folder.parent_id.clone(),
            created_at: folder.created_at,
            updated_at: folder.updated_at,
            deleted_at: folder.deleted_at,
        }
    }

    /// Converts into a store record. The id must be present (server-minted
    /// or client-minted) by the time an entity is persisted.
    pub fn into_record(self, owner_id: &str) -> SyncResult<Folder> {
        let id = self.id.ok_or(SyncError::MissingEntityId {
            entity_type: "FOLDER".into(),
        })?;
        Ok(Folder {
            id,
            owner_id: owner_id.to_string(),
            name: self.name,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            sync_status: SyncStatus::Synced,
        })
    }
}

/// Deck on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_syncable!(DeckDto, "DECK");

impl DeckDto {
    pub fn from_record(deck: &Deck) -> Self {
        DeckDto {
            id: Some(deck.id.clone()),
            folder_id: deck.folder_id.clone(),
            name: deck.name.clone(),
            description: deck.description.clone(),
            created_at: deck.created_at,
            updated_at: deck.updated_at,
            deleted_at: deck.deleted_at,
        }
    }

    pub fn into_record(self, owner_id: &str) -> SyncResult<Deck> {
        let id = self.id.ok_or(SyncError::MissingEntityId {
            entity_type: "DECK".into(),
        })?;
        Ok(Deck {
            id,
            owner_id: owner_id.to_string(),
            folder_id: self.folder_id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            sync_status: SyncStatus::Synced,
        })
    }
}

/// Card on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub deck_id: String,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_syncable!(CardDto, "CARD");

impl CardDto {
    pub fn from_record(card: &Card) -> Self {
        CardDto {
            id: Some(card.id.clone()),
            deck_id: card.deck_id.clone(),
            front: card.front.clone(),
            back: card.back.clone(),
            created_at: card.created_at,
            updated_at: card.updated_at,
            deleted_at: card.deleted_at,
        }
    }

    pub fn into_record(self) -> SyncResult<Card> {
        let id = self.id.ok_or(SyncError::MissingEntityId {
            entity_type: "CARD".into(),
        })?;
        Ok(Card {
            id,
            deck_id: self.deck_id,
            front: self.front,
            back: self.back,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            sync_status: SyncStatus::Synced,
        })
    }
}

/// Card progress on the wire.
///
/// Field names match the external contract: `nextReview`, `interval`,
/// `easeFactor`, `repetitions`. The owner never travels inside the entity;
/// it is the request's owner scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardProgressDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub card_id: String,
    pub learning_state: LearningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<DateTime<Utc>>,
    pub interval: i64,
    pub ease_factor: f64,
    pub repetitions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_syncable!(CardProgressDto, "CARD_PROGRESS");

impl CardProgressDto {
    pub fn from_record(progress: &CardProgress) -> Self {
        CardProgressDto {
            id: Some(progress.id.clone()),
            card_id: progress.card_id.clone(),
            learning_state: progress.learning_state,
            next_review: progress.next_review_at,
            interval: progress.interval_days,
            ease_factor: progress.ease_factor,
            repetitions: progress.repetitions,
            created_at: progress.created_at,
            updated_at: progress.updated_at,
            deleted_at: progress.deleted_at,
        }
    }

    /// Converts into a store record, validating the scheduling invariants
    /// (`easeFactor >= 1.3`, `interval >= 0`) on the way in.
    pub fn into_record(self, owner_id: &str) -> SyncResult<CardProgress> {
        let id = self.id.ok_or(SyncError::MissingEntityId {
            entity_type: "CARD_PROGRESS".into(),
        })?;

        validate_scheduling(self.ease_factor, self.interval).map_err(|e| {
            SyncError::InvalidEntity {
                entity_type: "CARD_PROGRESS".into(),
                reason: e.to_string(),
            }
        })?;

        Ok(CardProgress {
            id,
            owner_id: owner_id.to_string(),
            card_id: self.card_id,
            learning_state: self.learning_state,
            interval_days: self.interval,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions,
            next_review_at: self.next_review,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            sync_status: SyncStatus::Synced,
        })
    }
}

/// Review log entry on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyLogDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub card_progress_id: String,
    pub grade: Grade,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken_seconds: Option<i64>,
    pub previous_interval: i64,
    pub new_interval: i64,
    pub previous_ease_factor: f64,
    pub new_ease_factor: f64,
    pub resulting_state: LearningState,
    pub reviewed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl_syncable!(StudyLogDto, "STUDY_LOG");

impl StudyLogDto {
    pub fn from_record(entry: &ReviewLogEntry) -> Self {
        StudyLogDto {
            id: Some(entry.id.clone()),
            card_progress_id: entry.card_progress_id.clone(),
            grade: entry.grade,
            time_taken_seconds: entry.time_taken_seconds,
            previous_interval: entry.previous_interval,
            new_interval: entry.new_interval,
            previous_ease_factor: entry.previous_ease_factor,
            new_ease_factor: entry.new_ease_factor,
            resulting_state: entry.resulting_state,
            reviewed_at: entry.reviewed_at,
            updated_at: entry.updated_at,
            deleted_at: entry.deleted_at,
        }
    }

    pub fn into_record(self, owner_id: &str) -> SyncResult<ReviewLogEntry> {
        let id = self.id.ok_or(SyncError::MissingEntityId {
            entity_type: "STUDY_LOG".into(),
        })?;
        Ok(ReviewLogEntry {
            id,
            card_progress_id: self.card_progress_id,
            owner_id: owner_id.to_string(),
            grade: self.grade,
            time_taken_seconds: self.time_taken_seconds,
            previous_interval: self.previous_interval,
            new_interval: self.new_interval,
            previous_ease_factor: self.previous_ease_factor,
            new_ease_factor: self.new_ease_factor,
            resulting_state: self.resulting_state,
            reviewed_at: self.reviewed_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            sync_status: SyncStatus::Synced,
        })
    }
}

// =============================================================================
// Envelopes
// =============================================================================

/// The pull response: a server clock snapshot plus every changed entity.
///
/// `server_time` is the authoritative cursor value - the caller stores it,
/// never its own clock, so clock skew cannot lose updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    pub server_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decks: Vec<DeckDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<CardDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub card_progress: Vec<CardProgressDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub study_logs: Vec<StudyLogDto>,
}

impl SyncEnvelope {
    /// An envelope carrying nothing but the clock snapshot.
    pub fn empty(server_time: DateTime<Utc>) -> Self {
        SyncEnvelope {
            server_time,
            folders: Vec::new(),
            decks: Vec::new(),
            cards: Vec::new(),
            card_progress: Vec::new(),
            study_logs: Vec::new(),
        }
    }

    /// Total number of entities across all collections.
    pub fn len(&self) -> usize {
        self.folders.len()
            + self.decks.len()
            + self.cards.len()
            + self.card_progress.len()
            + self.study_logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The push request body: changed entities per collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decks: Vec<DeckDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<CardDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub card_progress: Vec<CardProgressDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub study_logs: Vec<StudyLogDto>,
}

impl PushBatch {
    /// Total number of entities across all collections.
    pub fn len(&self) -> usize {
        self.folders.len()
            + self.decks.len()
            + self.cards.len()
            + self.card_progress.len()
            + self.study_logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entity the server refused during push.
///
/// Ownership violations and unresolvable parents reject the entity, not
/// the batch; everything else in the batch still lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEntity {
    /// Entity kind: "DECK", "CARD", "FOLDER", "CARD_PROGRESS", "STUDY_LOG".
    pub entity_type: String,

    /// The submitted id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable rejection reason.
    pub reason: String,
}

/// The push response: the same envelope shape as pull (`serverTime` plus
/// echoes of entities whose ids the server minted) extended with the
/// per-entity rejection report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushOutcome {
    #[serde(flatten)]
    pub envelope: SyncEnvelope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedEntity>,
}

/// Response of `GET sync/time`. Clock-skew diagnostics only; the sync
/// cursor comes from pull/push envelopes, not from this endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Deck;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_envelope_wire_shape() {
        let now = t("2026-03-01T12:00:00Z");
        let deck = Deck::new("owner-1", "Spanish", now);

        let envelope = SyncEnvelope {
            decks: vec![DeckDto::from_record(&deck)],
            ..SyncEnvelope::empty(now)
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"serverTime\""));
        assert!(json.contains("\"decks\""));
        assert!(json.contains("\"updatedAt\""));
        // Empty collections are omitted entirely
        assert!(!json.contains("\"cards\""));

        let parsed: SyncEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.decks.len(), 1);
        assert!(parsed.cards.is_empty());
        assert_eq!(parsed.server_time, now);
    }

    #[test]
    fn test_progress_wire_field_names() {
        let now = t("2026-03-01T12:00:00Z");
        let dto = CardProgressDto {
            id: Some("p-1".into()),
            card_id: "c-1".into(),
            learning_state: LearningState::Reviewing,
            next_review: Some(now),
            interval: 7,
            ease_factor: 2.5,
            repetitions: 3,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("\"cardId\""));
        assert!(json.contains("\"learningState\":\"reviewing\""));
        assert!(json.contains("\"nextReview\""));
        assert!(json.contains("\"interval\":7"));
        assert!(json.contains("\"easeFactor\":2.5"));
        assert!(json.contains("\"repetitions\":3"));
    }

    #[test]
    fn test_absent_id_means_create() {
        let json = r#"{
            "deckId": "d-1",
            "front": "hola",
            "back": "hello",
            "createdAt": "2026-03-01T12:00:00Z",
            "updatedAt": "2026-03-01T12:00:00Z"
        }"#;

        let dto: CardDto = serde_json::from_str(json).unwrap();
        assert!(dto.entity_id().is_none());

        let mut dto = dto;
        dto.set_entity_id("c-minted".into());
        assert_eq!(dto.entity_id(), Some("c-minted"));
    }

    #[test]
    fn test_into_record_requires_id() {
        let now = t("2026-03-01T12:00:00Z");
        let dto = CardDto {
            id: None,
            deck_id: "d-1".into(),
            front: "hola".into(),
            back: "hello".into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        assert!(matches!(
            dto.into_record(),
            Err(SyncError::MissingEntityId { .. })
        ));
    }

    #[test]
    fn test_into_record_validates_scheduling() {
        let now = t("2026-03-01T12:00:00Z");
        let dto = CardProgressDto {
            id: Some("p-1".into()),
            card_id: "c-1".into(),
            learning_state: LearningState::Reviewing,
            next_review: None,
            interval: 7,
            ease_factor: 0.9, // below the 1.3 floor
            repetitions: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        assert!(matches!(
            dto.into_record("owner-1"),
            Err(SyncError::InvalidEntity { .. })
        ));
    }

    #[test]
    fn test_push_outcome_flattens_envelope() {
        let now = t("2026-03-01T12:00:00Z");
        let outcome = PushOutcome {
            envelope: SyncEnvelope::empty(now),
            rejected: vec![RejectedEntity {
                entity_type: "CARD".into(),
                id: Some("c-1".into()),
                reason: "parent deck not owned by caller".into(),
            }],
        };

        let json = serde_json::to_string(&outcome).unwrap();
        // Same top-level shape as the pull envelope, plus the report
        assert!(json.contains("\"serverTime\""));
        assert!(json.contains("\"rejected\""));
        assert!(json.contains("\"entityType\":\"CARD\""));

        let parsed: PushOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn test_tombstone_roundtrip() {
        let now = t("2026-03-01T12:00:00Z");
        let dto = DeckDto {
            id: Some("d-1".into()),
            folder_id: None,
            name: "Spanish".into(),
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };

        assert!(dto.is_tombstone());

        let json = serde_json::to_string(&dto).unwrap();
        let parsed: DeckDto = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.deleted_at, Some(now));
    }
}
