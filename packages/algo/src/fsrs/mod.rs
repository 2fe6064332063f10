//! FSRS (Free Spaced Repetition Scheduler) Implementation
//!
//! FSRS-4 scheduling on (stability, difficulty) with a fixed 17-weight
//! parameter vector.
//!
//! Core steps for one review:
//! 1. Difficulty moves linearly with the rating and is clamped to [1, 10]
//! 2. Stability is seeded per rating for new cards, otherwise scaled by a
//!    rating-dependent multiplier, kept within [0.1, 36500]
//! 3. Interval inverts the forgetting curve at the requested retention
//! 4. Optional ±15% fuzz spreads cards that would land on the same day
//! 5. Interval is capped at the configured maximum
//!
//! Randomness is injected through [`rand::Rng`] so callers can seed it or
//! disable fuzz for deterministic results.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::sanitize::{clamp_difficulty, clamp_stability, sanitize_difficulty, sanitize_fsrs_config};
use crate::types::{
    FsrsCard, FsrsCardState, FsrsConfig, FsrsOutcome, FsrsRating, FsrsReview, ReviewLog,
    FSRS_WEIGHTS, FUZZ_FACTOR,
};

// ==================== Constants ====================

/// Forgetting curve scale: R(t) = (1 + t / (9 S))^-1
const CURVE_SCALE: f64 = 9.0;

/// Rating at which the difficulty adjustment crosses zero
const DIFFICULTY_PIVOT: f64 = 2.5;

// ==================== Core Formulas ====================

/// Difficulty after a review: Again/Hard raise it, Good/Easy lower it
pub fn next_difficulty(difficulty: f64, rating: FsrsRating) -> f64 {
    let w = &FSRS_WEIGHTS;
    let delta = rating.value() as f64 - DIFFICULTY_PIVOT;
    clamp_difficulty(difficulty - w[6] * delta)
}

/// Stability assigned on the first review
pub fn initial_stability(rating: FsrsRating) -> f64 {
    FSRS_WEIGHTS[rating.to_index()]
}

/// Stability after reviewing a card that already has a memory trace
pub fn next_stability(stability: f64, difficulty: f64, rating: FsrsRating) -> f64 {
    let w = &FSRS_WEIGHTS;
    let decay = difficulty.powf(-w[9]);
    let next = match rating {
        FsrsRating::Again => stability * w[13],
        FsrsRating::Hard => stability * (1.0 + w[15] * decay),
        FsrsRating::Good => stability * (1.0 + w[8] * decay),
        FsrsRating::Easy => stability * (1.0 + w[8] * w[16]),
    };
    clamp_stability(next)
}

/// Probability of recall after `elapsed_days` at the given stability
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let t = elapsed_days.max(0.0);
    1.0 / (1.0 + t / (CURVE_SCALE * stability))
}

/// Days until recall probability falls to `request_retention` (at least 1)
pub fn next_interval(stability: f64, request_retention: f64) -> i64 {
    let days = stability * CURVE_SCALE * (1.0 / request_retention - 1.0);
    (days.round() as i64).max(1)
}

/// Jitter an interval uniformly within ±15%, never below 1 day
pub fn apply_fuzz<R: Rng + ?Sized>(interval: i64, rng: &mut R) -> i64 {
    let factor = rng.gen_range(-FUZZ_FACTOR..=FUZZ_FACTOR);
    ((interval as f64 * (1.0 + factor)).round() as i64).max(1)
}

// ==================== Scheduling ====================

/// Schedule one review.
///
/// # Arguments
/// * `card` - Current memory state (stability absent means new card)
/// * `review` - Rating and optional answer time
/// * `config` - Retention target, interval cap, fuzz toggle
/// * `now` - Review time
/// * `rng` - Random source for fuzz (unused when fuzz is disabled)
pub fn calculate_fsrs<R: Rng + ?Sized>(
    card: &FsrsCard,
    review: &FsrsReview,
    config: &FsrsConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> FsrsOutcome {
    let config = sanitize_fsrs_config(config);
    let rating = review.rating;

    let difficulty = next_difficulty(sanitize_difficulty(card.difficulty), rating);
    let stability = match card.stability {
        Some(s) if !card.is_new() => next_stability(s, difficulty, rating),
        _ => initial_stability(rating),
    };

    let base_interval = next_interval(stability, config.request_retention);
    let interval = if config.enable_fuzz {
        apply_fuzz(base_interval, rng)
    } else {
        base_interval
    };
    let interval = interval.min(config.maximum_interval).max(1);
    let due = now + Duration::days(interval);

    let elapsed_days = card
        .last_review
        .map(|last| (now - last).num_days().max(0));

    FsrsOutcome {
        card: FsrsCardState {
            stability,
            difficulty,
            due,
            last_review: now,
        },
        review_log: ReviewLog {
            rating,
            stability,
            difficulty,
            due,
            scheduled_days: interval,
            elapsed_days,
            answer_time_ms: review.answer_time_ms,
            reviewed_at: now,
        },
    }
}

/// Unfuzzed interval (days) for each rating Again..Easy
pub fn preview_fsrs(card: &FsrsCard, config: &FsrsConfig) -> [i64; 4] {
    let config = FsrsConfig {
        enable_fuzz: false,
        ..sanitize_fsrs_config(config)
    };
    let now = Utc::now();
    // 关闭 fuzz 后不会读取随机数
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    FsrsRating::ALL.map(|rating| {
        calculate_fsrs(card, &FsrsReview::new(rating), &config, now, &mut rng)
            .review_log
            .scheduled_days
    })
}

// ==================== Scheduler ====================

/// FSRS scheduler owning its config and a seedable random source
#[derive(Clone, Debug)]
pub struct FsrsScheduler {
    config: FsrsConfig,
    rng: ChaCha8Rng,
}

impl FsrsScheduler {
    /// Create a scheduler seeded from system entropy
    pub fn new(config: FsrsConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Create a scheduler with a specific seed (for testing)
    pub fn with_seed(config: FsrsConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Set random seed (for testing)
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn config(&self) -> &FsrsConfig {
        &self.config
    }

    pub fn schedule(&mut self, card: &FsrsCard, review: &FsrsReview, now: DateTime<Utc>) -> FsrsOutcome {
        calculate_fsrs(card, review, &self.config, now, &mut self.rng)
    }

    pub fn preview(&self, card: &FsrsCard) -> [i64; 4] {
        preview_fsrs(card, &self.config)
    }
}

impl Default for FsrsScheduler {
    fn default() -> Self {
        Self::new(FsrsConfig::default())
    }
}

// ==================== Tests ====================
