//! End-to-end sync rounds: two client stores reconciling through one
//! server store over the in-process loopback transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use recall_core::{Card, Deck, Grade, LearningState};
use recall_db::{Database, DbConfig};
use recall_sync::{
    LocalTransport, PushBatch, PushOutcome, SyncEngine, SyncEnvelope, SyncError, SyncResult,
    SyncService, SyncTransport,
};

const OWNER: &str = "learner-1";

async fn new_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// One server store shared by every engine in a test.
async fn server() -> (SyncService, LocalTransport) {
    let service = SyncService::new(new_db().await);
    let transport = LocalTransport::new(service.clone());
    (service, transport)
}

/// Seeds a deck with one card into a client store (both pending).
async fn seed_client(db: &Database) -> (String, String) {
    let now = Utc::now();
    let deck = Deck::new(OWNER, "Spanish", now);
    db.decks().upsert(&deck).await.unwrap();
    let card = Card::new(&deck.id, "hola", "hello", now);
    db.cards().upsert(&card).await.unwrap();
    (deck.id, card.id)
}

#[tokio::test]
async fn test_full_round_trip_between_two_devices() {
    let (service, transport) = server().await;

    // Device A creates a deck, grades the card, and syncs
    let db_a = new_db().await;
    let (_, card_id) = seed_client(&db_a).await;
    db_a.progress()
        .record_review(OWNER, &card_id, Grade::Good, Some(5), Utc::now())
        .await
        .unwrap();

    let engine_a = SyncEngine::new(db_a.clone(), transport.clone(), OWNER);
    let summary = engine_a.sync_once().await.unwrap();

    // deck + card + progress + log all uploaded, nothing rejected
    assert_eq!(summary.push.uploaded, 4);
    assert_eq!(summary.push.rejected, 0);

    // The server store now holds the graded state
    let server_progress = service
        .db()
        .progress()
        .get(OWNER, &card_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(server_progress.interval_days, 1);
    assert_eq!(service.db().review_log().count(OWNER).await.unwrap(), 1);

    // Device B starts empty and pulls everything
    let db_b = new_db().await;
    let engine_b = SyncEngine::new(db_b.clone(), transport.clone(), OWNER);
    let summary = engine_b.sync_once().await.unwrap();

    assert_eq!(summary.pull.received, 4);
    assert_eq!(summary.pull.applied, 4);

    let progress_b = db_b.progress().get(OWNER, &card_id).await.unwrap().unwrap();
    assert_eq!(progress_b.interval_days, 1);
    assert_eq!(progress_b.repetitions, 1);
    assert_eq!(progress_b.learning_state, LearningState::Reviewing);
    assert!(db_b.cards().get(&card_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_later_grade_wins_across_devices() {
    let (_, transport) = server().await;

    let db_a = new_db().await;
    let (_, card_id) = seed_client(&db_a).await;
    db_a.progress()
        .record_review(OWNER, &card_id, Grade::Good, None, Utc::now())
        .await
        .unwrap();

    let engine_a = SyncEngine::new(db_a.clone(), transport.clone(), OWNER);
    engine_a.sync_once().await.unwrap();

    let db_b = new_db().await;
    let engine_b = SyncEngine::new(db_b.clone(), transport.clone(), OWNER);
    engine_b.sync_once().await.unwrap();

    // Device B grades the same card later: interval 1 -> ceil(1 × 2.5) = 3
    db_b.progress()
        .record_review(OWNER, &card_id, Grade::Good, None, Utc::now())
        .await
        .unwrap();
    engine_b.sync_once().await.unwrap();

    // Device A observes the winning state on its next pull
    engine_a.sync_once().await.unwrap();
    let progress_a = db_a.progress().get(OWNER, &card_id).await.unwrap().unwrap();
    assert_eq!(progress_a.repetitions, 2);
    assert_eq!(progress_a.interval_days, 3);
}

#[tokio::test]
async fn test_tombstones_propagate() {
    let (_, transport) = server().await;

    let db_a = new_db().await;
    let (_, card_id) = seed_client(&db_a).await;
    db_a.progress()
        .record_review(OWNER, &card_id, Grade::Good, None, Utc::now())
        .await
        .unwrap();

    let engine_a = SyncEngine::new(db_a.clone(), transport.clone(), OWNER);
    engine_a.sync_once().await.unwrap();

    let db_b = new_db().await;
    let engine_b = SyncEngine::new(db_b.clone(), transport.clone(), OWNER);
    engine_b.sync_once().await.unwrap();
    assert_eq!(db_b.progress().due_cards(OWNER, Utc::now(), 10).await.unwrap().len(), 0);

    // Device A deletes the card; the deletion must travel as data
    let now = Utc::now();
    db_a.cards().soft_delete(&card_id, now).await.unwrap();
    db_a.progress().soft_delete_for_card(&card_id, now).await.unwrap();
    engine_a.sync_once().await.unwrap();

    engine_b.sync_once().await.unwrap();

    let card_b = db_b.cards().get(&card_id).await.unwrap().unwrap();
    assert!(card_b.deleted_at.is_some());
    let progress_b = db_b.progress().get(OWNER, &card_id).await.unwrap().unwrap();
    assert!(progress_b.deleted_at.is_some());
    assert!(db_b
        .progress()
        .due_cards(OWNER, Utc::now(), 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_synced_rows_are_not_reuploaded() {
    let (service, transport) = server().await;

    let db = new_db().await;
    let (_, card_id) = seed_client(&db).await;
    db.progress()
        .record_review(OWNER, &card_id, Grade::Good, None, Utc::now())
        .await
        .unwrap();

    let engine = SyncEngine::new(db.clone(), transport, OWNER);
    engine.sync_once().await.unwrap();

    // Second round: nothing pending, nothing new to apply
    let summary = engine.sync_once().await.unwrap();
    assert_eq!(summary.push.uploaded, 0);
    assert_eq!(summary.pull.applied, 0);

    // The audit entry was uploaded exactly once
    assert_eq!(service.db().review_log().count(OWNER).await.unwrap(), 1);
}

#[tokio::test]
async fn test_entities_do_not_reappear_after_cursor() {
    let (_, transport) = server().await;

    let db = new_db().await;
    seed_client(&db).await;

    let engine = SyncEngine::new(db.clone(), transport, OWNER);
    let first = engine.sync_once().await.unwrap();
    assert!(first.pull.received > 0);

    // Everything pulled before the cursor stays out of later deltas
    // unless modified again
    let second = engine.pull_once().await.unwrap();
    assert_eq!(second.received, 0);
    assert!(second.server_time >= first.pull.server_time);
}

#[tokio::test]
async fn test_rejected_entities_stay_pending() {
    let (service, transport) = server().await;

    // The server already holds another learner's deck
    let foreign_deck = Deck::new("someone-else", "Theirs", Utc::now());
    service.db().decks().upsert(&foreign_deck).await.unwrap();

    // This client holds a local copy of that deck claiming it as its own
    // (already marked synced, so only the card goes up) and tries to push
    // a card into it
    let db = new_db().await;
    let mut local_deck = foreign_deck.clone();
    local_deck.owner_id = OWNER.to_string();
    local_deck.sync_status = recall_core::SyncStatus::Synced;
    db.decks().upsert(&local_deck).await.unwrap();

    let card = Card::new(&foreign_deck.id, "q", "a", Utc::now());
    db.cards().upsert(&card).await.unwrap();

    let engine = SyncEngine::new(db.clone(), transport, OWNER);
    let summary = engine.sync_once().await.unwrap();

    assert_eq!(summary.push.uploaded, 1);
    assert_eq!(summary.push.rejected, 1);

    // The rejected card is not on the server and stays pending locally,
    // so a later round (after manual resolution) can retry it
    assert!(service.db().cards().get(&card.id).await.unwrap().is_none());
    let pending = db.cards().pending(OWNER, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, card.id);
}

// =============================================================================
// Failure handling
// =============================================================================

/// A transport standing in for an unreachable server.
struct FailingTransport;

#[async_trait]
impl SyncTransport for FailingTransport {
    async fn pull(
        &self,
        _owner_id: &str,
        _since: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncEnvelope> {
        Err(SyncError::ConnectionFailed("server unreachable".into()))
    }

    async fn push(&self, _owner_id: &str, _batch: PushBatch) -> SyncResult<PushOutcome> {
        Err(SyncError::ConnectionFailed("server unreachable".into()))
    }

    async fn server_time(&self) -> SyncResult<DateTime<Utc>> {
        Err(SyncError::ConnectionFailed("server unreachable".into()))
    }
}

#[tokio::test]
async fn test_failed_round_leaves_local_state_untouched() {
    let db = new_db().await;
    let (_, card_id) = seed_client(&db).await;
    db.progress()
        .record_review(OWNER, &card_id, Grade::Good, None, Utc::now())
        .await
        .unwrap();

    let engine = SyncEngine::new(db.clone(), FailingTransport, OWNER);
    let err = engine.sync_once().await.unwrap_err();
    assert!(err.is_retryable());

    // Cursor never advanced, nothing lost, everything still pending
    assert!(db.cursors().get(OWNER).await.unwrap().is_none());
    assert_eq!(db.progress().pending(OWNER, 10).await.unwrap().len(), 1);
    assert_eq!(db.review_log().count_pending(OWNER).await.unwrap(), 1);

    // Grading continues uninterrupted despite the sync failure
    db.progress()
        .record_review(OWNER, &card_id, Grade::Again, None, Utc::now())
        .await
        .unwrap();
    assert_eq!(db.review_log().count_pending(OWNER).await.unwrap(), 2);
}
