//! Per (learner, item) scheduling state.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::sm2::{DEFAULT_EASE, FIRST_INTERVAL_DAYS};

/// Review state of a single learner/item pair.
///
/// A pair is `NotStarted` until its first review (or favorite toggle) creates a
/// record. `reset_progress` is the only way back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewState {
    NotStarted,
    Learning,
    Learned,
}

impl ReviewState {
    pub fn of(record: Option<&ReviewRecord>) -> Self {
        match record {
            None => ReviewState::NotStarted,
            Some(r) if r.remembered => ReviewState::Learned,
            Some(_) => ReviewState::Learning,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub remembered: bool,
    pub review_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub is_favorite: bool,
}

impl Default for ReviewRecord {
    fn default() -> Self {
        Self {
            remembered: false,
            review_count: 0,
            last_reviewed_at: None,
            next_review_at: None,
            ease_factor: DEFAULT_EASE,
            interval_days: FIRST_INTERVAL_DAYS,
            is_favorite: false,
        }
    }
}

impl ReviewRecord {
    /// Record created by favoriting an item that was never reviewed.
    ///
    /// Scheduling fields keep their defaults and the item becomes due one
    /// interval from `now`.
    pub fn favorited(now: DateTime<Utc>) -> Self {
        let mut record = Self {
            is_favorite: true,
            ..Self::default()
        };
        record.schedule_from(now);
        record
    }

    pub fn state(&self) -> ReviewState {
        ReviewState::of(Some(self))
    }

    /// Stamps `now` as the last review and derives the next one from `interval_days`.
    pub fn schedule_from(&mut self, now: DateTime<Utc>) {
        self.last_reviewed_at = Some(now);
        self.next_review_at = Some(now + Duration::days(i64::from(self.interval_days)));
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_some_and(|next| next <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_record() {
        let record = ReviewRecord::default();
        assert_eq!(record.ease_factor, 2.5);
        assert_eq!(record.interval_days, 1);
        assert_eq!(record.review_count, 0);
        assert!(!record.is_favorite);
        assert_eq!(record.state(), ReviewState::Learning);
    }

    #[test]
    fn test_favorited_record_is_scheduled_one_day_out() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = ReviewRecord::favorited(now);

        assert!(record.is_favorite);
        assert!(!record.remembered);
        assert_eq!(record.review_count, 0);
        assert_eq!(record.last_reviewed_at, Some(now));
        assert_eq!(record.next_review_at, Some(now + Duration::days(1)));
        assert!(!record.is_due(now));
        assert!(record.is_due(now + Duration::days(1)));
    }

    #[test]
    fn test_state_of_missing_record() {
        assert_eq!(ReviewState::of(None), ReviewState::NotStarted);

        let learned = ReviewRecord {
            remembered: true,
            ..ReviewRecord::default()
        };
        assert_eq!(learned.state(), ReviewState::Learned);
    }
}
