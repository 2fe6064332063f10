//! Rating Bridge
//!
//! One rating control drives both schedulers, so SM-2 quality (0-5) and FSRS
//! rating (1-4) are converted here. The two scales have different
//! granularity, so the quality → rating direction is lossy: 1 and 4 come
//! back as 2 and 5 after a round trip.
//!
//! | SM-2 quality | FSRS rating |
//! |--------------|-------------|
//! | 0            | Again       |
//! | 1, 2         | Hard        |
//! | 3            | Good        |
//! | 4, 5         | Easy        |
//!
//! Reverse: Again → 0, Hard → 2, Good → 3, Easy → 5.

use crate::types::{FsrsRating, Sm2Quality};

pub fn sm2_quality_to_fsrs_rating(quality: Sm2Quality) -> FsrsRating {
    match quality.value() {
        0 => FsrsRating::Again,
        1 | 2 => FsrsRating::Hard,
        3 => FsrsRating::Good,
        _ => FsrsRating::Easy,
    }
}

pub fn fsrs_rating_to_sm2_quality(rating: FsrsRating) -> Sm2Quality {
    match rating {
        FsrsRating::Again => Sm2Quality::BLACKOUT,
        FsrsRating::Hard => Sm2Quality(2),
        FsrsRating::Good => Sm2Quality(3),
        FsrsRating::Easy => Sm2Quality::PERFECT,
    }
}

impl From<Sm2Quality> for FsrsRating {
    fn from(quality: Sm2Quality) -> Self {
        sm2_quality_to_fsrs_rating(quality)
    }
}

impl From<FsrsRating> for Sm2Quality {
    fn from(rating: FsrsRating) -> Self {
        fsrs_rating_to_sm2_quality(rating)
    }
}
