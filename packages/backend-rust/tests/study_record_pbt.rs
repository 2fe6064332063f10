//! Property-Based Tests for study record counters
//!
//! Tests the following invariants:
//! - correct_reviews never exceeds total_reviews
//! - correct_reviews counts exactly the ratings with quality >= 3
//! - every accepted rating stamps last_quality / last_reviewed_at

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use kapian_algo::{expand, Card, FsrsConfig, FsrsScheduler};
use kapian_backend::services::study_session::{StudyMode, StudySession};
use kapian_backend::store::MemoryStudyRecordStore;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_mode() -> impl Strategy<Value = StudyMode> {
    prop_oneof![
        Just(StudyMode::Fsrs),
        Just(StudyMode::SpacedRepetition),
        Just(StudyMode::SimpleReview),
    ]
}

fn arb_qualities() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..=5, 1..25)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// PBT-1: counters track the rating history in every mode
    #[test]
    fn counters_match_history(mode in arb_mode(), qualities in arb_qualities(), seed in any::<u64>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let session = StudySession::with_scheduler(
            Arc::new(MemoryStudyRecordStore::new()),
            mode,
            FsrsScheduler::with_seed(FsrsConfig::default(), seed),
        );
        let item = expand(&Card::basic("card", "Q", "A")).remove(0);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let record = runtime.block_on(async {
            let mut last = None;
            for (i, quality) in qualities.iter().enumerate() {
                let at = start + Duration::days(i as i64);
                let outcome = session.record_rating("user", &item, *quality, None, at).await.unwrap();
                last = Some(outcome.record);
            }
            last.unwrap()
        });

        let expected_correct = qualities.iter().filter(|q| **q >= 3).count() as u32;
        prop_assert!(record.correct_reviews <= record.total_reviews);
        prop_assert_eq!(record.total_reviews, qualities.len() as u32);
        prop_assert_eq!(record.correct_reviews, expected_correct);
        prop_assert_eq!(record.last_quality, qualities.last().map(|q| *q as u8));
        prop_assert_eq!(
            record.last_reviewed_at,
            Some(start + Duration::days(qualities.len() as i64 - 1))
        );
    }

    /// PBT-2: out-of-range qualities never touch the store
    #[test]
    fn invalid_quality_leaves_store_empty(quality in prop_oneof![i64::MIN..0i64, 6i64..i64::MAX]) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let session = StudySession::new(
            Arc::new(MemoryStudyRecordStore::new()),
            StudyMode::SpacedRepetition,
            FsrsConfig::default(),
        );
        let item = expand(&Card::basic("card", "Q", "A")).remove(0);

        let result = runtime.block_on(session.record_rating("user", &item, quality, None, Utc::now()));
        prop_assert!(result.is_err());
        prop_assert!(session.store().is_empty());
    }
}
