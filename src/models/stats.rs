//! Learner-facing progress counts
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: u64,
    pub learned: u64,
    pub in_progress: u64,
    pub not_started: u64,
}

impl ProgressStats {
    /// `not_started` is derived and never negative, even when records point at
    /// items outside the learner's own collections.
    pub fn new(total: u64, learned: u64, in_progress: u64) -> Self {
        Self {
            total,
            learned,
            in_progress,
            not_started: total.saturating_sub(learned + in_progress),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: ProgressStats,
    pub due_today: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProgress {
    pub collection_id: i64,
    pub name: String,
    pub total: u64,
    pub learned: u64,
    pub is_completed: bool,
}

impl CollectionProgress {
    pub fn new(collection_id: i64, name: String, total: u64, learned: u64) -> Self {
        Self {
            collection_id,
            name,
            total,
            learned,
            is_completed: total > 0 && learned >= total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_started_never_negative() {
        let stats = ProgressStats::new(2, 3, 1);
        assert_eq!(stats.not_started, 0);

        let stats = ProgressStats::new(10, 3, 2);
        assert_eq!(stats.not_started, 5);
    }

    #[test]
    fn test_empty_collection_is_not_completed() {
        assert!(!CollectionProgress::new(1, "empty".into(), 0, 0).is_completed);
        assert!(CollectionProgress::new(1, "done".into(), 3, 3).is_completed);
        assert!(!CollectionProgress::new(1, "half".into(), 4, 2).is_completed);
    }
}
