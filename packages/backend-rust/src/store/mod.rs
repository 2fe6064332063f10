//! Study record persistence interface
//!
//! The scheduler only needs a key-value store keyed by (user, card). One
//! record holds the state of every mode; each mode patches its own fields.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;

pub use memory::MemoryStudyRecordStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecord {
    pub id: String,
    pub user_id: String,
    pub card_id: String,
    // SM-2
    pub ease_factor: Option<f64>,
    pub interval: Option<i64>,
    pub repetitions: Option<u32>,
    pub next_review_date: Option<DateTime<Utc>>,
    // FSRS
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub due: Option<DateTime<Utc>>,
    // all modes
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_quality: Option<u8>,
    pub total_reviews: u32,
    pub correct_reviews: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields to overwrite; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecordPatch {
    pub ease_factor: Option<f64>,
    pub interval: Option<i64>,
    pub repetitions: Option<u32>,
    pub next_review_date: Option<DateTime<Utc>>,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub due: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_quality: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecordUpsert {
    pub user_id: String,
    pub card_id: String,
    #[serde(flatten)]
    pub patch: StudyRecordPatch,
    pub increment_total: bool,
    pub increment_correct: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait StudyRecordStore: Send + Sync {
    fn get_study_record(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> impl Future<Output = Result<Option<StudyRecord>, StoreError>> + Send;

    /// Insert or patch the record for (user, card); must be atomic per key
    fn upsert_study_record(
        &self,
        upsert: StudyRecordUpsert,
    ) -> impl Future<Output = Result<StudyRecord, StoreError>> + Send;
}

impl StudyRecord {
    pub fn new(user_id: &str, card_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            card_id: card_id.to_string(),
            ease_factor: None,
            interval: None,
            repetitions: None,
            next_review_date: None,
            stability: None,
            difficulty: None,
            due: None,
            last_reviewed_at: None,
            last_quality: None,
            total_reviews: 0,
            correct_reviews: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, upsert: &StudyRecordUpsert, now: DateTime<Utc>) {
        let patch = &upsert.patch;
        if let Some(v) = patch.ease_factor {
            self.ease_factor = Some(v);
        }
        if let Some(v) = patch.interval {
            self.interval = Some(v);
        }
        if let Some(v) = patch.repetitions {
            self.repetitions = Some(v);
        }
        if let Some(v) = patch.next_review_date {
            self.next_review_date = Some(v);
        }
        if let Some(v) = patch.stability {
            self.stability = Some(v);
        }
        if let Some(v) = patch.difficulty {
            self.difficulty = Some(v);
        }
        if let Some(v) = patch.due {
            self.due = Some(v);
        }
        if let Some(v) = patch.last_reviewed_at {
            self.last_reviewed_at = Some(v);
        }
        if let Some(v) = patch.last_quality {
            self.last_quality = Some(v);
        }
        if upsert.increment_total {
            self.total_reviews = self.total_reviews.saturating_add(1);
        }
        if upsert.increment_correct {
            self.correct_reviews = self.correct_reviews.saturating_add(1);
        }
        self.updated_at = now;
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_reviews == 0 {
            0.0
        } else {
            self.correct_reviews as f64 / self.total_reviews as f64
        }
    }
}

pub(crate) fn validate_key(user_id: &str, card_id: &str) -> Result<(), StoreError> {
    if user_id.trim().is_empty() {
        return Err(StoreError::Validation("userId must not be empty".to_string()));
    }
    if card_id.trim().is_empty() {
        return Err(StoreError::Validation("cardId must not be empty".to_string()));
    }
    Ok(())
}
