//! Cloze Expansion
//!
//! Turns one stored card into the study items the scheduler sees. A basic
//! card is one item; a cloze card is one item per blank id, each shown and
//! rated on its own.
//!
//! Cloze markers use the `{{c1::answer}}` / `{{c1::answer::hint}}` syntax.
//! All items expanded from one card keep its id in `original_card_id`, which
//! is the key the scheduling record is stored under.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const MARKER_PATTERN: &str = r"(?s)\{\{(c\d+)::(.*?)(?:::(.*?))?\}\}";
const OPENING_PATTERN: &str = r"\{\{c\d+::";

/// Placeholder shown for a blank without a hint
const BLANK_PLACEHOLDER: &str = "[...]";

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(MARKER_PATTERN).expect("cloze marker pattern is valid"))
}

fn opening_regex() -> &'static Regex {
    static OPENING: OnceLock<Regex> = OnceLock::new();
    OPENING.get_or_init(|| Regex::new(OPENING_PATTERN).expect("cloze opening pattern is valid"))
}

// ==================== Data Structures ====================

/// One blank in a cloze text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozeField {
    pub id: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Cloze source text plus its blanks in order of appearance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozeData {
    pub text: String,
    pub fields: Vec<ClozeField>,
}

/// Content of a persisted card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CardContent {
    Basic { front: String, back: String },
    Cloze(ClozeData),
}

/// A persisted card as the deck stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub content: CardContent,
}

impl Card {
    pub fn basic(id: impl Into<String>, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: CardContent::Basic {
                front: front.into(),
                back: back.into(),
            },
        }
    }

    pub fn cloze(id: impl Into<String>, text: &str) -> Self {
        Self {
            id: id.into(),
            content: CardContent::Cloze(parse_cloze(text)),
        }
    }
}

/// What a study item shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StudyCardKind {
    Basic {
        front: String,
        back: String,
    },
    #[serde(rename_all = "camelCase")]
    Cloze {
        data: ClozeData,
        field_id: String,
    },
}

/// A schedulable unit derived from a [`Card`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyCard {
    pub id: String,
    pub original_card_id: String,
    pub kind: StudyCardKind,
}

impl StudyCard {
    pub fn field_id(&self) -> Option<&str> {
        match &self.kind {
            StudyCardKind::Cloze { field_id, .. } => Some(field_id),
            StudyCardKind::Basic { .. } => None,
        }
    }
}

/// Problems found in cloze source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClozeIssue {
    #[error("no cloze fields found")]
    NoFields,
    #[error("cloze field {id} is empty")]
    EmptyField { id: String },
    #[error("cloze id {id} is used more than once")]
    DuplicateId { id: String },
    #[error("unclosed cloze marker")]
    UnclosedMarker,
}

// ==================== Parsing ====================

fn field_from_captures(caps: &Captures<'_>) -> ClozeField {
    let hint = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .filter(|h| !h.is_empty());
    ClozeField {
        id: caps[1].to_string(),
        answer: caps[2].to_string(),
        hint,
    }
}

/// Extract every `{{cN::answer[::hint]}}` marker in order
pub fn parse_cloze(text: &str) -> ClozeData {
    let fields = marker_regex()
        .captures_iter(text)
        .map(|caps| field_from_captures(&caps))
        .collect();
    ClozeData {
        text: text.to_string(),
        fields,
    }
}

/// Check cloze source text; an empty result means the text is valid
pub fn validate_cloze(text: &str) -> Vec<ClozeIssue> {
    let data = parse_cloze(text);
    let mut issues = Vec::new();

    if opening_regex().find_iter(text).count() > data.fields.len() {
        issues.push(ClozeIssue::UnclosedMarker);
    }

    if data.fields.is_empty() {
        if issues.is_empty() {
            issues.push(ClozeIssue::NoFields);
        }
        return issues;
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for field in &data.fields {
        if field.answer.trim().is_empty() {
            issues.push(ClozeIssue::EmptyField {
                id: field.id.clone(),
            });
        }
        if !seen.insert(field.id.as_str()) && reported.insert(field.id.as_str()) {
            issues.push(ClozeIssue::DuplicateId {
                id: field.id.clone(),
            });
        }
    }

    issues
}

impl ClozeData {
    pub fn field(&self, field_id: &str) -> Option<&ClozeField> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn answer(&self, field_id: &str) -> Option<&str> {
        self.field(field_id).map(|f| f.answer.as_str())
    }

    /// Question text for one field: that blank hidden, all others revealed
    pub fn prompt(&self, field_id: &str) -> Option<String> {
        self.field(field_id)?;
        let rendered = marker_regex().replace_all(&self.text, |caps: &Captures<'_>| {
            let field = field_from_captures(caps);
            if field.id == field_id {
                match field.hint {
                    Some(hint) => format!("[{hint}]"),
                    None => BLANK_PLACEHOLDER.to_string(),
                }
            } else {
                field.answer
            }
        });
        Some(rendered.into_owned())
    }
}

// ==================== Expansion ====================

/// Expand one card into its study items
///
/// Basic cards yield one item; cloze cards yield one item per distinct field
/// id, in order of first appearance. A repeated `cN` is studied once, with
/// every occurrence hidden. A cloze card without fields yields nothing.
pub fn expand(card: &Card) -> Vec<StudyCard> {
    match &card.content {
        CardContent::Basic { front, back } => vec![StudyCard {
            id: card.id.clone(),
            original_card_id: card.id.clone(),
            kind: StudyCardKind::Basic {
                front: front.clone(),
                back: back.clone(),
            },
        }],
        CardContent::Cloze(data) => {
            let mut seen = HashSet::new();
            data.fields
                .iter()
                .filter(|field| seen.insert(field.id.as_str()))
                .map(|field| StudyCard {
                    id: format!("{}-{}", card.id, field.id),
                    original_card_id: card.id.clone(),
                    kind: StudyCardKind::Cloze {
                        data: data.clone(),
                        field_id: field.id.clone(),
                    },
                })
                .collect()
        }
    }
}

/// Expand a whole deck, preserving card order
pub fn expand_all(cards: &[Card]) -> Vec<StudyCard> {
    cards.iter().flat_map(expand).collect()
}

// ==================== Tests ====================
