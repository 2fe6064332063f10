//! Replays rating events from a JSON-lines stream through a [`StudySession`].
//!
//! Each input line is one review: `{ userId, card, fieldId?, quality,
//! answerTimeMs?, reviewedAt? }`. Each accepted line produces one
//! [`RatingOutcome`] line on the output. Lines that fail to parse or to
//! schedule are logged and skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use kapian_algo::{expand, Card, StudyCard};

use super::study_session::{RatingOutcome, SessionError, SessionTally, StudySession};
use crate::store::StudyRecordStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEvent {
    pub user_id: String,
    pub card: Card,
    #[serde(default)]
    pub field_id: Option<String>,
    pub quality: i64,
    #[serde(default)]
    pub answer_time_ms: Option<u64>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("malformed event: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("card {card_id} has no cloze field {field_id}")]
    UnknownField { card_id: String, field_id: String },
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub tally: SessionTally,
    pub skipped: u32,
}

impl ReplayEvent {
    /// The study item this event rates: the named cloze field, else the first item
    pub fn study_card(&self) -> Result<StudyCard, ReplayError> {
        let mut items = expand(&self.card);
        match &self.field_id {
            Some(field_id) => items
                .into_iter()
                .find(|item| item.field_id() == Some(field_id.as_str()))
                .ok_or_else(|| ReplayError::UnknownField {
                    card_id: self.card.id.clone(),
                    field_id: field_id.clone(),
                }),
            None if items.is_empty() => Err(SessionError::DeckEmpty.into()),
            None => Ok(items.swap_remove(0)),
        }
    }
}

pub async fn replay_line<S: StudyRecordStore>(
    session: &StudySession<S>,
    line: &str,
) -> Result<RatingOutcome, ReplayError> {
    let event: ReplayEvent = serde_json::from_str(line)?;
    let study_card = event.study_card()?;
    let now = event.reviewed_at.unwrap_or_else(Utc::now);
    let outcome = session
        .record_rating(
            &event.user_id,
            &study_card,
            event.quality,
            event.answer_time_ms,
            now,
        )
        .await?;
    Ok(outcome)
}

pub async fn run_replay<S, R, W>(
    session: &StudySession<S>,
    reader: R,
    mut writer: W,
) -> std::io::Result<ReplaySummary>
where
    S: StudyRecordStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = ReplaySummary::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match replay_line(session, &line).await {
            Ok(outcome) => {
                summary.tally.record(&outcome);
                let mut json = serde_json::to_vec(&outcome)
                    .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
                json.push(b'\n');
                writer.write_all(&json).await?;
            }
            Err(err) => {
                summary.skipped += 1;
                warn!(line = line_no, error = %err, "replay line skipped");
            }
        }
    }

    writer.flush().await?;
    Ok(summary)
}
