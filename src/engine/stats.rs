//! Read-only aggregates for dashboards.
use super::{MAX_DUE_LIMIT, Scheduler};
use crate::clock::Clock;
use crate::database::ReviewStore;
use crate::error::Result;
use crate::models::{CollectionProgress, Dashboard, ProgressStats};

impl<S: ReviewStore, C: Clock> Scheduler<S, C> {
    /// Total, learned, in-progress and not-started counts for a learner.
    ///
    /// `total` only counts items in the learner's own collections while the
    /// record counts include every record the learner has.
    pub fn query_stats(&self, learner_id: i64) -> Result<ProgressStats> {
        let store = self.store();
        let total = store.count_owned_items(learner_id)?;
        let learned = store.count_records(learner_id, true)?;
        let in_progress = store.count_records(learner_id, false)?;
        Ok(ProgressStats::new(total, learned, in_progress))
    }

    /// Stats plus how many items are due right now (capped at the due query maximum).
    pub fn dashboard(&self, learner_id: i64) -> Result<Dashboard> {
        let stats = self.query_stats(learner_id)?;
        let due_today = self.query_due(learner_id, MAX_DUE_LIMIT)?.len() as u64;
        Ok(Dashboard { stats, due_today })
    }

    pub fn collection_progress(&self, learner_id: i64) -> Result<Vec<CollectionProgress>> {
        Ok(self.store().collection_progress(learner_id)?)
    }
}
