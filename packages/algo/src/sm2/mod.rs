//! SM-2 Spaced Repetition Algorithm
//!
//! Classic SuperMemo-2 scheduling on (repetitions, interval, ease factor).
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout
//! - 1: Incorrect, answer remembered on seeing it
//! - 2: Incorrect, answer seemed easy once shown
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect recall
//!
//! A failed review (quality < 3) restarts the learning curve but keeps the
//! updated ease factor. Intervals are capped at 100 years.

use chrono::{DateTime, Duration, Utc};

use crate::sanitize::{sanitize_ease_factor, sanitize_interval};
use crate::types::{
    Sm2Card, Sm2Quality, Sm2Result, MIN_EASE_FACTOR, SM2_EASE_BASE, SM2_EASE_LINEAR,
    SM2_EASE_QUADRATIC, SM2_FIRST_INTERVAL, SM2_MAXIMUM_INTERVAL, SM2_SECOND_INTERVAL,
};

/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3
pub fn next_ease_factor(ease_factor: f64, quality: Sm2Quality) -> f64 {
    let miss = (5 - quality.value()) as f64;
    let delta = SM2_EASE_BASE - miss * (SM2_EASE_LINEAR + miss * SM2_EASE_QUADRATIC);
    (ease_factor + delta).max(MIN_EASE_FACTOR)
}

/// Calculate the next SM-2 state for one review.
///
/// # Arguments
/// * `quality` - Recall quality (0-5)
/// * `repetitions` - Successful repetitions so far
/// * `interval` - Current interval in days (0 for a new card)
/// * `ease_factor` - Current ease factor
/// * `now` - Review time; the next review date is `now + interval` days
pub fn calculate_sm2(
    quality: Sm2Quality,
    repetitions: u32,
    interval: i64,
    ease_factor: f64,
    now: DateTime<Utc>,
) -> Sm2Result {
    let ease_factor = next_ease_factor(sanitize_ease_factor(ease_factor), quality);
    let previous_interval = sanitize_interval(interval);

    let (interval, repetitions) = if !quality.is_correct() {
        (SM2_FIRST_INTERVAL, 0)
    } else {
        let repetitions = repetitions.saturating_add(1);
        let interval = match repetitions {
            1 => SM2_FIRST_INTERVAL,
            2 => SM2_SECOND_INTERVAL,
            _ => ((previous_interval as f64) * ease_factor).round() as i64,
        };
        (interval.clamp(1, SM2_MAXIMUM_INTERVAL), repetitions)
    };

    Sm2Result {
        interval,
        repetitions,
        ease_factor,
        next_review_date: now + Duration::days(interval),
    }
}

impl Sm2Card {
    pub fn review(&self, quality: Sm2Quality, now: DateTime<Utc>) -> Sm2Result {
        calculate_sm2(quality, self.repetitions, self.interval, self.ease_factor, now)
    }
}

/// Interval (days) each quality 0..=5 would produce, for rating buttons
pub fn preview_sm2(card: &Sm2Card, now: DateTime<Utc>) -> [i64; 6] {
    let mut out = [0; 6];
    for quality in Sm2Quality::all() {
        out[quality.value() as usize] = card.review(quality, now).interval;
    }
    out
}
