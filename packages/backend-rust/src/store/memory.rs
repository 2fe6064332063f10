use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use super::{validate_key, StoreError, StudyRecord, StudyRecordStore, StudyRecordUpsert};

/// In-process store; the write lock makes each upsert atomic
#[derive(Debug, Default)]
pub struct MemoryStudyRecordStore {
    records: RwLock<HashMap<(String, String), StudyRecord>>,
}

impl MemoryStudyRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn records_for_user(&self, user_id: &str) -> Vec<StudyRecord> {
        let mut out: Vec<StudyRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.card_id.cmp(&b.card_id));
        out
    }
}

impl StudyRecordStore for MemoryStudyRecordStore {
    async fn get_study_record(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<StudyRecord>, StoreError> {
        validate_key(user_id, card_id)?;
        let key = (user_id.to_string(), card_id.to_string());
        Ok(self.records.read().get(&key).cloned())
    }

    async fn upsert_study_record(
        &self,
        upsert: StudyRecordUpsert,
    ) -> Result<StudyRecord, StoreError> {
        validate_key(&upsert.user_id, &upsert.card_id)?;
        let now = Utc::now();
        let key = (upsert.user_id.clone(), upsert.card_id.clone());

        let mut records = self.records.write();
        let record = records
            .entry(key)
            .or_insert_with(|| StudyRecord::new(&upsert.user_id, &upsert.card_id, now));
        record.apply(&upsert, now);

        debug!(
            user_id = %upsert.user_id,
            card_id = %upsert.card_id,
            total = record.total_reviews,
            "study record upserted"
        );
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StudyRecordPatch;

    fn upsert(card_id: &str, correct: bool) -> StudyRecordUpsert {
        StudyRecordUpsert {
            user_id: "user1".to_string(),
            card_id: card_id.to_string(),
            patch: StudyRecordPatch {
                last_quality: Some(if correct { 4 } else { 1 }),
                ..Default::default()
            },
            increment_total: true,
            increment_correct: correct,
        }
    }

    #[tokio::test]
    async fn test_get_missing_record_is_none() {
        let store = MemoryStudyRecordStore::new();
        assert!(store.get_study_record("user1", "card1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemoryStudyRecordStore::new();
        let first = store.upsert_study_record(upsert("card1", true)).await.unwrap();
        let second = store.upsert_study_record(upsert("card1", false)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.total_reviews, 2);
        assert_eq!(second.correct_reviews, 1);
        assert_eq!(second.last_quality, Some(1));
        assert_eq!(store.len(), 1);

        let loaded = store.get_study_record("user1", "card1").await.unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_records_are_keyed_per_user() {
        let store = MemoryStudyRecordStore::new();
        store.upsert_study_record(upsert("card1", true)).await.unwrap();
        let mut other = upsert("card1", true);
        other.user_id = "user2".to_string();
        store.upsert_study_record(other).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.records_for_user("user1").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = MemoryStudyRecordStore::new();
        let result = store.get_study_record("", "card1").await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }
}
