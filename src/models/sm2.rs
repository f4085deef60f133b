//! SM-2 (SuperMemo 2) spaced repetition update, adapted.
//!
//! The update calculates review intervals based on recall quality:
//! - Each record has an easiness factor (EF) that adjusts based on performance
//! - The first review of a pair always schedules 1 day out, whatever the quality
//! - Quality grades 0-2: interval drops back to 1 day (repetition count still grows)
//! - Quality grades 3-5: interval grows progressively (1 day → 6 days → EF multiplier)
//! - EF is adjusted after each later review and has a minimum value of 1.3

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ReviewRecord;

pub const DEFAULT_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;
pub const FIRST_INTERVAL_DAYS: u32 = 1;
pub const SECOND_INTERVAL_DAYS: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("quality must be between 0 and 5, got {0}")]
pub struct InvalidQuality(pub u8);

/// Recall quality, 0 = complete blackout, 5 = perfect response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    /// Grade sent for a card marked "not remembered" in a study session.
    pub const FORGOTTEN: Quality = Quality(2);
    pub const DEFAULT: Quality = Quality(3);
    /// Grade sent for a card marked "remembered" in a study session.
    pub const REMEMBERED: Quality = Quality(4);
    pub const PERFECT: Quality = Quality(5);

    pub fn new(value: u8) -> Result<Self, InvalidQuality> {
        if value <= 5 {
            Ok(Self(value))
        } else {
            Err(InvalidQuality(value))
        }
    }

    pub fn for_outcome(remembered: bool) -> Self {
        if remembered {
            Self::REMEMBERED
        } else {
            Self::FORGOTTEN
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= 3
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Quality {
    type Error = InvalidQuality;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> u8 {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// New E-Factor after a review of the given quality, floored at 1.3.
pub fn adjust_ease(ease: f64, quality: Quality) -> f64 {
    let q = f64::from(quality.value());
    let new_ef = ease + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02));
    new_ef.max(MIN_EASE)
}

/// Interval for the next review, given the interval and count *before* this review
/// and the already adjusted ease.
pub fn next_interval(interval_days: u32, review_count: u32, new_ease: f64, quality: Quality) -> u32 {
    if !quality.is_passing() {
        return FIRST_INTERVAL_DAYS;
    }

    let interval = match review_count {
        0 => FIRST_INTERVAL_DAYS,
        1 => SECOND_INTERVAL_DAYS,
        _ => (f64::from(interval_days) * new_ease).round() as u32,
    };
    interval.max(FIRST_INTERVAL_DAYS)
}

/// Record produced by the very first review of a pair.
pub fn first_review(remembered: bool, now: DateTime<Utc>) -> ReviewRecord {
    let mut record = ReviewRecord {
        remembered,
        review_count: 1,
        ..ReviewRecord::default()
    };
    record.schedule_from(now);
    record
}

/// Calculates the record that results from reviewing `record` again at `now`.
pub fn calculate_next_review(
    record: &ReviewRecord,
    remembered: bool,
    quality: Quality,
    now: DateTime<Utc>,
) -> ReviewRecord {
    let ease = adjust_ease(record.ease_factor, quality);
    let interval = next_interval(record.interval_days, record.review_count, ease, quality);

    let mut next = ReviewRecord {
        remembered,
        review_count: record.review_count + 1,
        ease_factor: ease,
        interval_days: interval,
        is_favorite: record.is_favorite,
        ..ReviewRecord::default()
    };
    next.schedule_from(now);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_first_review() {
        let next = first_review(true, now());
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.review_count, 1);
        assert_eq!(next.ease_factor, 2.5);
        assert_eq!(next.next_review_at, Some(now() + Duration::days(1)));
    }

    #[test]
    fn test_second_review() {
        let review = first_review(true, now());

        let next = calculate_next_review(&review, true, Quality::REMEMBERED, now());
        assert_eq!(next.interval_days, 6);
        assert_eq!(next.review_count, 2);
    }

    #[test]
    fn test_quality_below_3_resets_interval() {
        let review = ReviewRecord {
            ease_factor: 2.5,
            interval_days: 10,
            review_count: 5,
            remembered: true,
            ..ReviewRecord::default()
        };

        let next = calculate_next_review(&review, false, Quality::FORGOTTEN, now());
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.review_count, 6);
        assert!(!next.remembered);
        // EF should still be updated
        assert!(next.ease_factor < 2.5);
    }

    #[test]
    fn test_ef_floor() {
        let review = ReviewRecord {
            ease_factor: 1.3,
            interval_days: 1,
            review_count: 1,
            ..ReviewRecord::default()
        };

        let next = calculate_next_review(&review, false, Quality::new(0).unwrap(), now());
        assert_eq!(next.ease_factor, MIN_EASE);
    }

    #[test]
    fn test_ease_and_interval_bounds_hold_for_every_quality_sequence() {
        let mut record = first_review(false, now());
        // Walk a deterministic mix of grades, including long runs of failures.
        let grades = [0u8, 1, 2, 0, 0, 5, 3, 4, 1, 5, 5, 5, 2, 0, 3, 3, 4, 0, 0, 0];
        for (i, grade) in grades.iter().cycle().take(200).enumerate() {
            let quality = Quality::new(*grade).unwrap();
            let at = now() + Duration::days(i as i64);
            record = calculate_next_review(&record, quality.is_passing(), quality, at);
            assert!(record.ease_factor >= MIN_EASE);
            assert!(record.interval_days >= 1);
            assert_eq!(
                record.next_review_at,
                Some(at + Duration::days(i64::from(record.interval_days)))
            );
        }
        assert_eq!(record.review_count, 201);
    }

    #[test]
    fn test_three_perfect_reviews() {
        let first = first_review(true, now());
        let second = calculate_next_review(&first, true, Quality::PERFECT, now());
        let third = calculate_next_review(&second, true, Quality::PERFECT, now());

        assert_eq!(first.interval_days, 1);
        assert_eq!(second.interval_days, 6);
        assert!((second.ease_factor - 2.6).abs() < 1e-9);
        // 6 * 2.7 = 16.2
        assert_eq!(third.interval_days, 16);
    }

    #[test]
    fn test_favorite_survives_review() {
        let favorite = ReviewRecord::favorited(now());
        let next = calculate_next_review(&favorite, true, Quality::REMEMBERED, now());
        assert!(next.is_favorite);
        // Count 0 means the record was created without a review
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.review_count, 1);
    }

    #[test]
    fn test_quality_validation() {
        assert_eq!(Quality::new(6), Err(InvalidQuality(6)));
        assert_eq!(Quality::try_from(5).map(u8::from), Ok(5));
        assert_eq!(Quality::default(), Quality::DEFAULT);
        assert_eq!(Quality::for_outcome(true), Quality::REMEMBERED);
        assert_eq!(Quality::for_outcome(false), Quality::FORGOTTEN);
    }
}
