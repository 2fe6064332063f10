use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kapian_algo::{
    expand_all, sm2_quality_to_fsrs_rating, AlgoError, Card, FsrsCard, FsrsConfig, FsrsRating,
    FsrsReview, FsrsScheduler, Sm2Card, Sm2Quality, StudyCard, DEFAULT_EASE_FACTOR,
};

use crate::config::Config;
use crate::store::{StoreError, StudyRecord, StudyRecordPatch, StudyRecordStore, StudyRecordUpsert};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudyMode {
    Fsrs,
    SpacedRepetition,
    SimpleReview,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Fsrs => "fsrs",
            StudyMode::SpacedRepetition => "spaced-repetition",
            StudyMode::SimpleReview => "simple-review",
        }
    }
}

impl FromStr for StudyMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fsrs" => Ok(StudyMode::Fsrs),
            "spaced-repetition" => Ok(StudyMode::SpacedRepetition),
            "simple-review" => Ok(StudyMode::SimpleReview),
            other => Err(SessionError::InvalidStudyMode(other.to_string())),
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("deck has no cards to study")]
    DeckEmpty,
    #[error("no cards are currently due")]
    NothingDue { next_due: Option<DateTime<Utc>> },
    #[error("unknown study mode: {0}")]
    InvalidStudyMode(String),
    #[error(transparent)]
    Algo(#[from] AlgoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Empty deck / nothing due are reported to the user, not treated as failures
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::DeckEmpty | SessionError::NothingDue { .. })
    }
}

/// Scheduler output persisted for one rating
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SchedulingUpdate {
    #[serde(rename_all = "camelCase")]
    Fsrs {
        rating: FsrsRating,
        stability: f64,
        difficulty: f64,
        due: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SpacedRepetition {
        ease_factor: f64,
        interval: i64,
        repetitions: u32,
        next_review_date: DateTime<Utc>,
    },
    SimpleReview,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOutcome {
    pub study_card_id: String,
    pub card_id: String,
    pub mode: StudyMode,
    pub quality: u8,
    pub correct: bool,
    pub update: SchedulingUpdate,
    pub record: StudyRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTally {
    pub reviewed: u32,
    pub correct: u32,
}

impl SessionTally {
    pub fn record(&mut self, outcome: &RatingOutcome) {
        self.reviewed += 1;
        if outcome.correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.reviewed == 0 {
            0.0
        } else {
            self.correct as f64 / self.reviewed as f64
        }
    }
}

type RecordKey = (String, String);
type KeyLockMap = Mutex<HashMap<RecordKey, Arc<tokio::sync::Mutex<()>>>>;

/// Handle on the async lock for one (user, card); the map entry is removed
/// when the last handle drops, including when a rating future is cancelled
struct KeyLock<'a> {
    locks: &'a KeyLockMap,
    key: RecordKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> KeyLock<'a> {
    fn acquire(locks: &'a KeyLockMap, key: RecordKey) -> Self {
        let lock = Arc::clone(locks.lock().entry(key.clone()).or_default());
        Self { locks, key, lock }
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // map entry + this handle
        let last = locks
            .get(&self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if last {
            locks.remove(&self.key);
        }
    }
}

/// Runs rating events through the scheduler selected by the study mode and
/// persists the result. Ratings for the same (user, card) are serialized.
pub struct StudySession<S> {
    store: Arc<S>,
    mode: StudyMode,
    fsrs: Mutex<FsrsScheduler>,
    key_locks: KeyLockMap,
}

impl<S: StudyRecordStore> StudySession<S> {
    pub fn new(store: Arc<S>, mode: StudyMode, fsrs_config: FsrsConfig) -> Self {
        Self::with_scheduler(store, mode, FsrsScheduler::new(fsrs_config))
    }

    pub fn with_scheduler(store: Arc<S>, mode: StudyMode, scheduler: FsrsScheduler) -> Self {
        Self {
            store,
            mode,
            fsrs: Mutex::new(scheduler),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(store: Arc<S>, config: &Config) -> Self {
        let scheduler = match config.fuzz_seed {
            Some(seed) => FsrsScheduler::with_seed(config.fsrs.clone(), seed),
            None => FsrsScheduler::new(config.fsrs.clone()),
        };
        Self::with_scheduler(store, config.study_mode, scheduler)
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Expand the deck and return the study items due at `now`
    ///
    /// New items are always due and go last; scheduled items are ordered by
    /// due date, most overdue first. Simple review returns every item.
    pub async fn build_queue(
        &self,
        user_id: &str,
        cards: &[Card],
        now: DateTime<Utc>,
    ) -> Result<Vec<StudyCard>, SessionError> {
        let items = expand_all(cards);
        if items.is_empty() {
            return Err(SessionError::DeckEmpty);
        }

        // 同一张填空卡的各字段共用一条记录，只读取一次
        let mut records: HashMap<String, Option<StudyRecord>> = HashMap::new();
        for item in &items {
            if !records.contains_key(&item.original_card_id) {
                let record = self
                    .store
                    .get_study_record(user_id, &item.original_card_id)
                    .await?;
                records.insert(item.original_card_id.clone(), record);
            }
        }

        let mut due = Vec::new();
        let mut next_due: Option<DateTime<Utc>> = None;
        for item in items {
            let record = records.get(&item.original_card_id).and_then(Option::as_ref);
            match self.due_at(record) {
                None => due.push((None, item)),
                Some(at) if at <= now => due.push((Some(at), item)),
                Some(at) => next_due = Some(next_due.map_or(at, |n| n.min(at))),
            }
        }

        if due.is_empty() {
            return Err(SessionError::NothingDue { next_due });
        }

        due.sort_by_key(|(at, _)| (at.is_none(), *at));
        info!(
            user_id,
            mode = %self.mode,
            due = due.len(),
            "study queue built"
        );
        Ok(due.into_iter().map(|(_, item)| item).collect())
    }

    /// Apply one rating (SM-2 quality 0-5 from the rating control)
    pub async fn record_rating(
        &self,
        user_id: &str,
        card: &StudyCard,
        quality: i64,
        answer_time_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome, SessionError> {
        let quality = Sm2Quality::try_from(quality)?;
        let key: RecordKey = (user_id.to_string(), card.original_card_id.clone());

        let key_lock = KeyLock::acquire(&self.key_locks, key);
        let _guard = key_lock.lock.lock().await;
        self.rate_locked(user_id, card, quality, answer_time_ms, now).await
    }

    async fn rate_locked(
        &self,
        user_id: &str,
        card: &StudyCard,
        quality: Sm2Quality,
        answer_time_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome, SessionError> {
        let card_id = card.original_card_id.as_str();
        let existing = self.store.get_study_record(user_id, card_id).await?;
        let (update, patch) = self.schedule(existing.as_ref(), quality, answer_time_ms, now);

        let correct = quality.is_correct();
        let record = self
            .store
            .upsert_study_record(StudyRecordUpsert {
                user_id: user_id.to_string(),
                card_id: card_id.to_string(),
                patch,
                increment_total: true,
                increment_correct: correct,
            })
            .await
            .map_err(|err| {
                warn!(error = %err, user_id, card_id, "study record upsert failed");
                err
            })?;

        debug!(
            user_id,
            card_id,
            study_card_id = %card.id,
            mode = %self.mode,
            quality = quality.value(),
            "rating recorded"
        );

        Ok(RatingOutcome {
            study_card_id: card.id.clone(),
            card_id: card_id.to_string(),
            mode: self.mode,
            quality: quality.value(),
            correct,
            update,
            record,
        })
    }

    fn schedule(
        &self,
        existing: Option<&StudyRecord>,
        quality: Sm2Quality,
        answer_time_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> (SchedulingUpdate, StudyRecordPatch) {
        let mut patch = StudyRecordPatch {
            last_reviewed_at: Some(now),
            last_quality: Some(quality.value()),
            ..Default::default()
        };

        let update = match self.mode {
            StudyMode::Fsrs => {
                let card = existing.map(fsrs_card_from_record).unwrap_or_default();
                let review = FsrsReview {
                    rating: sm2_quality_to_fsrs_rating(quality),
                    answer_time_ms,
                };
                let outcome = self.fsrs.lock().schedule(&card, &review, now);
                patch.stability = Some(outcome.card.stability);
                patch.difficulty = Some(outcome.card.difficulty);
                patch.due = Some(outcome.card.due);
                SchedulingUpdate::Fsrs {
                    rating: review.rating,
                    stability: outcome.card.stability,
                    difficulty: outcome.card.difficulty,
                    due: outcome.card.due,
                }
            }
            StudyMode::SpacedRepetition => {
                let card = existing.map(sm2_card_from_record).unwrap_or_default();
                let result = card.review(quality, now);
                patch.ease_factor = Some(result.ease_factor);
                patch.interval = Some(result.interval);
                patch.repetitions = Some(result.repetitions);
                patch.next_review_date = Some(result.next_review_date);
                SchedulingUpdate::SpacedRepetition {
                    ease_factor: result.ease_factor,
                    interval: result.interval,
                    repetitions: result.repetitions,
                    next_review_date: result.next_review_date,
                }
            }
            StudyMode::SimpleReview => SchedulingUpdate::SimpleReview,
        };

        (update, patch)
    }

    fn due_at(&self, record: Option<&StudyRecord>) -> Option<DateTime<Utc>> {
        let record = record?;
        match self.mode {
            StudyMode::Fsrs => record.due,
            StudyMode::SpacedRepetition => record.next_review_date,
            StudyMode::SimpleReview => None,
        }
    }

    #[cfg(test)]
    fn pending_key_locks(&self) -> usize {
        self.key_locks.lock().len()
    }
}

fn fsrs_card_from_record(record: &StudyRecord) -> FsrsCard {
    FsrsCard {
        stability: record.stability,
        difficulty: record.difficulty,
        last_review: record.last_reviewed_at,
    }
}

fn sm2_card_from_record(record: &StudyRecord) -> Sm2Card {
    Sm2Card {
        repetitions: record.repetitions.unwrap_or(0),
        interval: record.interval.unwrap_or(0),
        ease_factor: record.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
    }
}
