//! Spaced-repetition scheduling engine.
//!
//! Turns review outcomes into new [`ReviewRecord`] states and answers the
//! due / difficult / learned / stats queries. The engine keeps no state of its
//! own: every call is a read and possibly a write against the [`ReviewStore`].
//! A review does its read and its write without a transaction, so two
//! concurrent reviews of the same pair resolve as last-write-wins.

mod stats;

use crate::clock::{Clock, SystemClock};
use crate::database::{ItemProgress, RecordEntry, ReviewStore};
use crate::error::{EngineError, Result};
use crate::models::sm2::{self, Quality};
use crate::models::{Item, ReviewRecord, ReviewRequest, ReviewState};

pub const DEFAULT_DUE_LIMIT: usize = 20;
pub const MAX_DUE_LIMIT: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject reviews and favorites for items outside the learner's collections.
    pub enforce_ownership: bool,
    /// Limit used by `query_due` when the caller passes 0.
    pub due_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            enforce_ownership: true,
            due_limit: DEFAULT_DUE_LIMIT,
        }
    }
}

pub struct Scheduler<S, C = SystemClock> {
    store: S,
    clock: C,
    options: EngineOptions,
}

impl<S: ReviewStore> Scheduler<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: ReviewStore, C: Clock> Scheduler<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Resolves the item and, when enforced, checks the learner owns its collection.
    fn checked_item(&self, learner_id: i64, item_id: i64) -> Result<Item> {
        let item = self
            .store
            .item(item_id)?
            .ok_or(EngineError::ItemNotFound(item_id))?;

        if self.options.enforce_ownership {
            let owner = self.store.collection_owner(item.collection_id)?;
            if owner != Some(learner_id) {
                log::warn!(
                    "Learner {} tried to change progress of item {} outside their collections",
                    learner_id,
                    item_id
                );
                return Err(EngineError::AccessDenied { learner_id, item_id });
            }
        }

        Ok(item)
    }

    /// Applies one review outcome and returns the resulting record.
    ///
    /// The first review of a pair always schedules one day out and leaves the
    /// ease untouched; `quality` only drives later reviews.
    pub fn record_review(
        &self,
        learner_id: i64,
        item_id: i64,
        remembered: bool,
        quality: Quality,
    ) -> Result<ReviewRecord> {
        let item = self.checked_item(learner_id, item_id)?;
        let now = self.clock.now();

        let first = sm2::first_review(remembered, now);
        let record = match self.store.get_or_create_record(learner_id, item.id, first)? {
            RecordEntry::Created(record) => {
                log::debug!("First review of item {} by learner {}", item.id, learner_id);
                record
            }
            RecordEntry::Existing(current) => {
                let next = sm2::calculate_next_review(&current, remembered, quality, now);
                self.store.put_record(learner_id, item.id, &next)?;
                next
            }
        };

        log::debug!(
            "Item {} reviewed by learner {} (remembered={}, quality={}): interval {}d, ease {:.2}",
            item.id,
            learner_id,
            remembered,
            quality,
            record.interval_days,
            record.ease_factor
        );
        Ok(record)
    }

    /// Validates a host-shaped review request and records it.
    pub fn submit_review(&self, learner_id: i64, request: &ReviewRequest) -> Result<ReviewRecord> {
        let (Some(item_id), Some(remembered)) = (request.item_id, request.remembered) else {
            return Err(EngineError::Validation(
                "item_id and remembered are required".to_string(),
            ));
        };
        let quality = match request.quality {
            Some(q) => Quality::new(q)?,
            None => Quality::DEFAULT,
        };

        self.record_review(learner_id, item_id, remembered, quality)
    }

    fn effective_due_limit(&self, limit: usize) -> usize {
        match limit {
            0 => self.options.due_limit.clamp(1, MAX_DUE_LIMIT),
            n => n.min(MAX_DUE_LIMIT),
        }
    }

    /// Items whose next review is at or before now, most overdue first.
    pub fn query_due(&self, learner_id: i64, limit: usize) -> Result<Vec<ItemProgress>> {
        let limit = self.effective_due_limit(limit);
        Ok(self.store.due_records(learner_id, self.clock.now(), limit)?)
    }

    /// Items last marked "not remembered", most recently failed first.
    pub fn query_difficult(&self, learner_id: i64) -> Result<Vec<ItemProgress>> {
        Ok(self.store.records_by_outcome(learner_id, false)?)
    }

    pub fn query_learned(&self, learner_id: i64) -> Result<Vec<ItemProgress>> {
        Ok(self.store.records_by_outcome(learner_id, true)?)
    }

    /// Every record of the learner, soonest review first.
    pub fn query_progress(&self, learner_id: i64) -> Result<Vec<ItemProgress>> {
        Ok(self.store.all_records(learner_id)?)
    }

    pub fn review_state(&self, learner_id: i64, item_id: i64) -> Result<ReviewState> {
        let record = self.store.get_record(learner_id, item_id)?;
        Ok(ReviewState::of(record.as_ref()))
    }

    /// Flips the favorite flag and returns the new value.
    ///
    /// Favoriting a never-reviewed item creates its record without counting
    /// a review.
    pub fn toggle_favorite(&self, learner_id: i64, item_id: i64) -> Result<bool> {
        let item = self.checked_item(learner_id, item_id)?;
        let fresh = ReviewRecord::favorited(self.clock.now());

        let is_favorite = match self.store.get_or_create_record(learner_id, item.id, fresh)? {
            RecordEntry::Created(record) => record.is_favorite,
            RecordEntry::Existing(mut record) => {
                record.is_favorite = !record.is_favorite;
                self.store.put_record(learner_id, item.id, &record)?;
                record.is_favorite
            }
        };
        Ok(is_favorite)
    }

    /// Forgets all progress on the pair. Returns whether there was any.
    pub fn reset_progress(&self, learner_id: i64, item_id: i64) -> Result<bool> {
        let removed = self.store.delete_record(learner_id, item_id)?;
        if removed {
            log::info!("Progress of item {} reset for learner {}", item_id, learner_id);
        }
        Ok(removed)
    }
}
