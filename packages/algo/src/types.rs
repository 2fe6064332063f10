//! Common Types and Constants
//!
//! Shared data structures used across all scheduling modules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// SM-2 ease factor floor
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// SM-2 ease factor for a never-rated card
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// SM-2 ease update: EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
pub const SM2_EASE_BASE: f64 = 0.1;
pub const SM2_EASE_LINEAR: f64 = 0.08;
pub const SM2_EASE_QUADRATIC: f64 = 0.02;

/// Interval after the first successful SM-2 repetition (days)
pub const SM2_FIRST_INTERVAL: i64 = 1;

/// Interval after the second successful SM-2 repetition (days)
pub const SM2_SECOND_INTERVAL: i64 = 6;
/// SM-2 间隔上限，与 FSRS 默认最大间隔一致
pub const SM2_MAXIMUM_INTERVAL: i64 = 36500;

/// FSRS-4 default weights (w0-w16)
pub const FSRS_WEIGHTS: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, // w0-w3: initial stability per rating
    4.93, 0.94, 0.86, 0.01, 1.49, // w4-w8
    0.14, 0.94, 2.18, 0.05, 0.34, // w9-w13
    1.26, 0.29, 2.61, // w14-w16
];

/// FSRS difficulty range
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty assumed for a card that has never been rated
pub const DEFAULT_DIFFICULTY: f64 = 5.0;

/// Stability floor (days)
pub const MIN_STABILITY: f64 = 0.1;

/// Stability ceiling (days), 100 years
pub const MAX_STABILITY: f64 = 36500.0;

/// Default target probability of recall at the due date
pub const DEFAULT_REQUEST_RETENTION: f64 = 0.9;

/// Default (and absolute) interval ceiling in days
pub const DEFAULT_MAXIMUM_INTERVAL: i64 = 36500;

/// Fuzz range as a fraction of the interval (±15%)
pub const FUZZ_FACTOR: f64 = 0.15;

// ==================== Errors ====================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlgoError {
    #[error("invalid rating {value}, expected {expected}")]
    InvalidRating { value: i64, expected: &'static str },
}

// ==================== Rating Scales ====================

/// SM-2 recall quality, 0 (blackout) to 5 (perfect)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Sm2Quality(pub(crate) u8);

impl Sm2Quality {
    pub const BLACKOUT: Sm2Quality = Sm2Quality(0);
    pub const PERFECT: Sm2Quality = Sm2Quality(5);

    /// Lowest quality counted as a successful recall
    pub const PASSING: u8 = 3;

    pub fn new(value: u8) -> Result<Self, AlgoError> {
        if value <= 5 {
            Ok(Self(value))
        } else {
            Err(AlgoError::InvalidRating {
                value: value as i64,
                expected: "SM-2 quality 0..=5",
            })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= Self::PASSING
    }

    pub fn all() -> impl Iterator<Item = Sm2Quality> {
        (0..=5).map(Sm2Quality)
    }
}

impl TryFrom<i64> for Sm2Quality {
    type Error = AlgoError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) => Self::new(v),
            Err(_) => Err(AlgoError::InvalidRating {
                value,
                expected: "SM-2 quality 0..=5",
            }),
        }
    }
}

impl TryFrom<i32> for Sm2Quality {
    type Error = AlgoError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(value as i64)
    }
}

impl From<Sm2Quality> for u8 {
    fn from(q: Sm2Quality) -> u8 {
        q.0
    }
}

impl fmt::Display for Sm2Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// FSRS review rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum FsrsRating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl FsrsRating {
    pub const ALL: [FsrsRating; 4] = [
        FsrsRating::Again,
        FsrsRating::Hard,
        FsrsRating::Good,
        FsrsRating::Easy,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Index into the 4-element per-rating tables (0 = Again)
    pub fn to_index(self) -> usize {
        self as usize - 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FsrsRating::Again => "again",
            FsrsRating::Hard => "hard",
            FsrsRating::Good => "good",
            FsrsRating::Easy => "easy",
        }
    }
}

impl TryFrom<i64> for FsrsRating {
    type Error = AlgoError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FsrsRating::Again),
            2 => Ok(FsrsRating::Hard),
            3 => Ok(FsrsRating::Good),
            4 => Ok(FsrsRating::Easy),
            _ => Err(AlgoError::InvalidRating {
                value,
                expected: "FSRS rating 1..=4",
            }),
        }
    }
}

impl TryFrom<i32> for FsrsRating {
    type Error = AlgoError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(value as i64)
    }
}

impl From<FsrsRating> for u8 {
    fn from(r: FsrsRating) -> u8 {
        r.value()
    }
}

impl fmt::Display for FsrsRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== SM-2 Types ====================

/// SM-2 memory state before a review
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2Card {
    pub repetitions: u32,
    /// Current interval (days), 0 for a never-rated card
    pub interval: i64,
    pub ease_factor: f64,
}

impl Default for Sm2Card {
    fn default() -> Self {
        Self {
            repetitions: 0,
            interval: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
        }
    }
}

/// SM-2 scheduling result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2Result {
    pub interval: i64,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
}

impl Sm2Result {
    /// State to feed into the next review
    pub fn card(&self) -> Sm2Card {
        Sm2Card {
            repetitions: self.repetitions,
            interval: self.interval,
            ease_factor: self.ease_factor,
        }
    }
}

// ==================== FSRS Types ====================

/// FSRS memory state before a review. `None`/non-positive stability means new card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsCard {
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
}

impl FsrsCard {
    pub fn is_new(&self) -> bool {
        !matches!(self.stability, Some(s) if s.is_finite() && s > 0.0)
    }
}

/// One review event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsReview {
    pub rating: FsrsRating,
    #[serde(default)]
    pub answer_time_ms: Option<u64>,
}

impl FsrsReview {
    pub fn new(rating: FsrsRating) -> Self {
        Self {
            rating,
            answer_time_ms: None,
        }
    }
}

/// FSRS scheduler options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FsrsConfig {
    /// Target recall probability at the due date
    pub request_retention: f64,
    /// Interval ceiling (days)
    pub maximum_interval: i64,
    /// Jitter intervals by ±15% to spread due dates
    pub enable_fuzz: bool,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            request_retention: DEFAULT_REQUEST_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            enable_fuzz: true,
        }
    }
}

impl FsrsConfig {
    /// Deterministic configuration (fuzz off)
    pub fn without_fuzz() -> Self {
        Self {
            enable_fuzz: false,
            ..Self::default()
        }
    }
}

/// FSRS memory state after a review
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsCardState {
    pub stability: f64,
    pub difficulty: f64,
    pub due: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
}

impl FsrsCardState {
    /// State to feed into the next review
    pub fn card(&self) -> FsrsCard {
        FsrsCard {
            stability: Some(self.stability),
            difficulty: Some(self.difficulty),
            last_review: Some(self.last_review),
        }
    }
}

/// Review telemetry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub rating: FsrsRating,
    pub stability: f64,
    pub difficulty: f64,
    pub due: DateTime<Utc>,
    pub scheduled_days: i64,
    /// Days since the previous review, when known
    pub elapsed_days: Option<i64>,
    pub answer_time_ms: Option<u64>,
    pub reviewed_at: DateTime<Utc>,
}

/// FSRS scheduling result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsOutcome {
    pub card: FsrsCardState,
    pub review_log: ReviewLog,
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    // ============ Sm2Quality 测试 ============

    #[test]
    fn test_sm2_quality_valid_range() {
        for v in 0u8..=5 {
            assert_eq!(Sm2Quality::new(v).map(|q| q.value()), Ok(v));
        }
    }

    #[test]
    fn test_sm2_quality_rejects_out_of_range() {
        assert!(matches!(
            Sm2Quality::new(6),
            Err(AlgoError::InvalidRating { value: 6, .. })
        ));
        assert!(Sm2Quality::try_from(-1i32).is_err());
        assert!(Sm2Quality::try_from(300i64).is_err());
    }

    #[test]
    fn test_sm2_quality_is_correct_threshold() {
        let correct: Vec<u8> = Sm2Quality::all()
            .filter(|q| q.is_correct())
            .map(|q| q.value())
            .collect();
        assert_eq!(correct, vec![3, 4, 5]);
    }

    // ============ FsrsRating 测试 ============

    #[test]
    fn test_fsrs_rating_try_from() {
        assert_eq!(FsrsRating::try_from(1i32), Ok(FsrsRating::Again));
        assert_eq!(FsrsRating::try_from(4i64), Ok(FsrsRating::Easy));
        assert!(FsrsRating::try_from(0i32).is_err());
        assert!(FsrsRating::try_from(5i32).is_err());
    }

    #[test]
    fn test_fsrs_rating_index_and_value() {
        for (i, rating) in FsrsRating::ALL.iter().enumerate() {
            assert_eq!(rating.to_index(), i);
            assert_eq!(rating.value() as usize, i + 1);
        }
    }

    #[test]
    fn test_rating_serde_uses_numbers() {
        let json = serde_json::to_string(&FsrsRating::Good).unwrap();
        assert_eq!(json, "3");
        let rating: FsrsRating = serde_json::from_str("2").unwrap();
        assert_eq!(rating, FsrsRating::Hard);
        assert!(serde_json::from_str::<FsrsRating>("7").is_err());

        let q: Sm2Quality = serde_json::from_str("4").unwrap();
        assert_eq!(q.value(), 4);
        assert!(serde_json::from_str::<Sm2Quality>("9").is_err());
    }

    // ============ Config 测试 ============

    #[test]
    fn test_fsrs_config_defaults() {
        let config = FsrsConfig::default();
        assert_eq!(config.request_retention, 0.9);
        assert_eq!(config.maximum_interval, 36500);
        assert!(config.enable_fuzz);
        assert!(!FsrsConfig::without_fuzz().enable_fuzz);
    }

    #[test]
    fn test_fsrs_config_partial_json() {
        let config: FsrsConfig = serde_json::from_str(r#"{"maximumInterval": 100}"#).unwrap();
        assert_eq!(config.maximum_interval, 100);
        assert_eq!(config.request_retention, DEFAULT_REQUEST_RETENTION);
        assert!(config.enable_fuzz);
    }

    #[test]
    fn test_fsrs_card_is_new() {
        assert!(FsrsCard::default().is_new());
        assert!(FsrsCard {
            stability: Some(0.0),
            ..Default::default()
        }
        .is_new());
        assert!(FsrsCard {
            stability: Some(f64::NAN),
            ..Default::default()
        }
        .is_new());
        assert!(!FsrsCard {
            stability: Some(3.0),
            ..Default::default()
        }
        .is_new());
    }

    #[test]
    fn test_weights_initial_stability_monotonic() {
        assert!(FSRS_WEIGHTS[0] < FSRS_WEIGHTS[1]);
        assert!(FSRS_WEIGHTS[1] < FSRS_WEIGHTS[2]);
        assert!(FSRS_WEIGHTS[2] < FSRS_WEIGHTS[3]);
    }
}
