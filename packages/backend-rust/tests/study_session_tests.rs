//! Integration tests for StudySession against in-memory and failing stores.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use kapian_algo::{expand, Card, FsrsConfig, FsrsScheduler, StudyCard};
use kapian_backend::config::Config;
use kapian_backend::services::study_session::{
    SchedulingUpdate, SessionError, StudyMode, StudySession,
};
use kapian_backend::store::{
    MemoryStudyRecordStore, StoreError, StudyRecord, StudyRecordStore, StudyRecordUpsert,
};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

fn seeded_session(mode: StudyMode) -> StudySession<MemoryStudyRecordStore> {
    StudySession::with_scheduler(
        Arc::new(MemoryStudyRecordStore::new()),
        mode,
        FsrsScheduler::with_seed(FsrsConfig::default(), 2024),
    )
}

fn basic_item(id: &str) -> StudyCard {
    expand(&Card::basic(id, "front", "back")).remove(0)
}

/// Reads succeed, writes always fail
#[derive(Default)]
struct UnavailableStore {
    upsert_attempts: AtomicU32,
}

impl StudyRecordStore for UnavailableStore {
    async fn get_study_record(
        &self,
        _user_id: &str,
        _card_id: &str,
    ) -> Result<Option<StudyRecord>, StoreError> {
        Ok(None)
    }

    async fn upsert_study_record(
        &self,
        _upsert: StudyRecordUpsert,
    ) -> Result<StudyRecord, StoreError> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ratings_on_one_card_are_serialized() {
    let session = Arc::new(seeded_session(StudyMode::SpacedRepetition));
    let item = basic_item("shared");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let session = Arc::clone(&session);
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            session
                .record_rating("user1", &item, 5, None, fixed_now())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = session
        .store()
        .get_study_record("user1", "shared")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.total_reviews, 16);
    assert_eq!(record.correct_reviews, 16);
    // every review saw the previous one's state
    assert_eq!(record.repetitions, Some(16));
}

#[tokio::test]
async fn ratings_on_different_users_do_not_interfere() {
    let session = seeded_session(StudyMode::SpacedRepetition);
    let item = basic_item("card1");

    let (a, b) = tokio::join!(
        session.record_rating("alice", &item, 5, None, fixed_now()),
        session.record_rating("bob", &item, 0, None, fixed_now()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.record.repetitions, Some(1));
    assert_eq!(b.record.repetitions, Some(0));
    assert_ne!(a.record.id, b.record.id);
    assert_eq!(session.store().len(), 2);
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = Arc::new(UnavailableStore::default());
    let session = StudySession::new(Arc::clone(&store), StudyMode::Fsrs, FsrsConfig::default());

    let err = session
        .record_rating("user1", &basic_item("card1"), 4, None, fixed_now())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Unavailable(_))));
    assert!(!err.is_recoverable());
    assert_eq!(store.upsert_attempts.load(Ordering::SeqCst), 1);

    // the key lock is released after a failure, so a retry is not blocked
    let retry = session
        .record_rating("user1", &basic_item("card1"), 4, None, fixed_now())
        .await;
    assert!(retry.is_err());
    assert_eq!(store.upsert_attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fsrs_reviews_build_on_stored_state() {
    let session = seeded_session(StudyMode::Fsrs);
    let item = basic_item("card1");

    let first = session
        .record_rating("user1", &item, 4, None, fixed_now())
        .await
        .unwrap();
    let first_due = first.record.due.unwrap();
    let second = session
        .record_rating("user1", &item, 4, None, first_due)
        .await
        .unwrap();

    let (s1, s2) = (first.record.stability.unwrap(), second.record.stability.unwrap());
    assert!(s2 > s1, "stability should grow on repeated success: {s1} -> {s2}");
    assert!(second.record.due.unwrap() > first_due);
    assert_eq!(second.record.last_reviewed_at, Some(first_due));
}

#[tokio::test]
async fn sm2_lapse_resets_repetitions() {
    let session = seeded_session(StudyMode::SpacedRepetition);
    let item = basic_item("card1");

    for day in 0..3 {
        session
            .record_rating("user1", &item, 4, None, fixed_now() + Duration::days(day))
            .await
            .unwrap();
    }
    let lapse = session
        .record_rating("user1", &item, 1, None, fixed_now() + Duration::days(30))
        .await
        .unwrap();

    match lapse.update {
        SchedulingUpdate::SpacedRepetition {
            repetitions,
            interval,
            ..
        } => {
            assert_eq!(repetitions, 0);
            assert_eq!(interval, 1);
        }
        other => panic!("unexpected update {other:?}"),
    }
    assert_eq!(lapse.record.total_reviews, 4);
    assert_eq!(lapse.record.correct_reviews, 3);
}

#[tokio::test]
async fn queue_then_rate_until_nothing_due() {
    let session = seeded_session(StudyMode::SpacedRepetition);
    let deck = [
        Card::basic("b1", "Q1", "A1"),
        Card::cloze("z1", "{{c1::Paris}} is the capital of {{c2::France}}"),
    ];

    let queue = session.build_queue("user1", &deck, fixed_now()).await.unwrap();
    assert_eq!(queue.len(), 3);
    for item in &queue {
        session
            .record_rating("user1", item, 5, None, fixed_now())
            .await
            .unwrap();
    }

    let err = session
        .build_queue("user1", &deck, fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NothingDue { next_due: Some(_) }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn session_from_config_uses_configured_mode() {
    let config = Config::from_lookup(|key| match key {
        "STUDY_MODE" => Some("simple-review".to_string()),
        "FSRS_FUZZ_SEED" => Some("11".to_string()),
        _ => None,
    });
    let session = StudySession::from_config(Arc::new(MemoryStudyRecordStore::new()), &config);
    assert_eq!(session.mode(), StudyMode::SimpleReview);

    let outcome = session
        .record_rating("user1", &basic_item("card1"), 3, None, fixed_now())
        .await
        .unwrap();
    assert_eq!(outcome.update, SchedulingUpdate::SimpleReview);
    assert!(outcome.correct);
}
