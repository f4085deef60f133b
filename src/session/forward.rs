//! Forwards session answers to the scheduling engine.
//!
//! The session queue stays authoritative while the durable record may lag:
//! every answer is queued in an outbox and the outbox is flushed after each
//! answer, oldest first. A storage failure keeps that answer and everything
//! behind it queued until the next flush. Anything the engine rejects outright
//! (unknown item, access denied) or that keeps failing past `max_attempts` is
//! dropped and logged.

use std::collections::VecDeque;

use crate::clock::Clock;
use crate::database::ReviewStore;
use crate::engine::Scheduler;
use crate::error::EngineError;
use crate::models::sm2::Quality;

use super::queue::SessionObserver;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReview {
    pub item_id: i64,
    pub remembered: bool,
    pub quality: Quality,
    pub attempts: u32,
}

fn is_retryable(err: &EngineError) -> bool {
    matches!(err, EngineError::Store(_))
}

pub struct ReviewForwarder<'a, S, C> {
    scheduler: &'a Scheduler<S, C>,
    learner_id: i64,
    outbox: VecDeque<PendingReview>,
    max_attempts: u32,
    delivered: usize,
    dropped: usize,
    last_cursor: usize,
    completed: Option<(usize, usize)>,
}

impl<'a, S: ReviewStore, C: Clock> ReviewForwarder<'a, S, C> {
    pub fn new(scheduler: &'a Scheduler<S, C>, learner_id: i64) -> Self {
        Self {
            scheduler,
            learner_id,
            outbox: VecDeque::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delivered: 0,
            dropped: 0,
            last_cursor: 0,
            completed: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingReview> {
        self.outbox.iter()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Cursor reported by the last card change.
    pub fn last_cursor(&self) -> usize {
        self.last_cursor
    }

    /// `(completed, total)` once the session has finished.
    pub fn completion(&self) -> Option<(usize, usize)> {
        self.completed
    }

    /// Delivers queued reviews oldest first.
    ///
    /// Stops at the first storage failure so later answers for the same item
    /// never land before an earlier one. Returns the last error seen.
    pub fn flush(&mut self) -> Result<(), EngineError> {
        let mut last_err = None;

        while let Some(mut pending) = self.outbox.pop_front() {
            let result = self.scheduler.record_review(
                self.learner_id,
                pending.item_id,
                pending.remembered,
                pending.quality,
            );
            match result {
                Ok(_) => self.delivered += 1,
                Err(err) => {
                    pending.attempts += 1;
                    if is_retryable(&err) && pending.attempts < self.max_attempts {
                        log::warn!(
                            "Review of item {} not saved (attempt {}), will retry: {}",
                            pending.item_id,
                            pending.attempts,
                            err
                        );
                        self.outbox.push_front(pending);
                        return Err(err);
                    }
                    log::error!(
                        "Dropping review of item {} after {} attempt(s): {}",
                        pending.item_id,
                        pending.attempts,
                        err
                    );
                    self.dropped += 1;
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<S: ReviewStore, C: Clock> SessionObserver for ReviewForwarder<'_, S, C> {
    fn on_review(&mut self, item_id: i64, remembered: bool) -> Result<(), EngineError> {
        self.outbox.push_back(PendingReview {
            item_id,
            remembered,
            quality: Quality::for_outcome(remembered),
            attempts: 0,
        });
        self.flush()
    }

    fn on_card_changed(&mut self, cursor: usize) {
        self.last_cursor = cursor;
    }

    fn on_complete(&mut self, completed: usize, total: usize) {
        self.completed = Some((completed, total));
        if !self.outbox.is_empty() {
            if let Err(e) = self.flush() {
                log::warn!("Session ended with unsaved reviews: {}", e);
            }
        }
    }
}
