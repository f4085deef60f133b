//! Study session queue.
//!
//! Holds the working batch of one sitting. Cards marked "not remembered" are
//! put back at a random position and keep coming back until they are marked
//! remembered, so a session only ends once every card has been mastered.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::models::{Item, ReviewRecord};

/// Time after an answer during which further answers are refused.
pub const DEFAULT_FEEDBACK_GATE: Duration = Duration::from_millis(500);

/// Anything that can be studied in a session.
pub trait StudyCard {
    fn item_id(&self) -> i64;
}

impl StudyCard for Item {
    fn item_id(&self) -> i64 {
        self.id
    }
}

impl StudyCard for (Item, ReviewRecord) {
    fn item_id(&self) -> i64 {
        self.0.id
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Sequential,
    #[default]
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Host callbacks for session events.
pub trait SessionObserver {
    /// Forwards one answer. Errors are logged by the queue and otherwise ignored.
    fn on_review(&mut self, item_id: i64, remembered: bool) -> Result<(), EngineError>;

    fn on_card_changed(&mut self, _cursor: usize) {}

    fn on_progress(&mut self, _completed: usize, _total: usize) {}

    fn on_complete(&mut self, _completed: usize, _total: usize) {}
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("the session has no cards left")]
    Empty,

    #[error("still showing feedback for the previous answer")]
    FeedbackPending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue { cursor: usize },
    Complete { completed: usize, total: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub completed: usize,
    pub total: usize,
    pub remaining: usize,
}

impl SessionProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// Working queue of one study session.
///
/// `len() + completed_count() == total_count()` holds at all times.
pub struct SessionQueue<T, O> {
    queue: Vec<T>,
    cursor: usize,
    flipped: bool,
    completed: usize,
    total: usize,
    mode: DisplayMode,
    observer: O,
    rng: StdRng,
    feedback_gate: Duration,
    gate_until: Option<Instant>,
}

impl<T: StudyCard, O: SessionObserver> SessionQueue<T, O> {
    pub fn new(batch: Vec<T>, mode: DisplayMode, observer: O) -> Self {
        Self::with_rng(batch, mode, observer, StdRng::from_entropy())
    }

    pub fn with_rng(batch: Vec<T>, mode: DisplayMode, observer: O, rng: StdRng) -> Self {
        let mut session = Self {
            total: batch.len(),
            queue: batch,
            cursor: 0,
            flipped: false,
            completed: 0,
            mode,
            observer,
            rng,
            feedback_gate: DEFAULT_FEEDBACK_GATE,
            gate_until: None,
        };
        if mode == DisplayMode::Random {
            session.queue.shuffle(&mut session.rng);
        }
        session
    }

    pub fn with_feedback_gate(mut self, gate: Duration) -> Self {
        self.feedback_gate = gate;
        self
    }

    /// Card under the cursor, `None` once the queue is empty.
    pub fn current(&self) -> Option<&T> {
        self.queue.get(self.cursor)
    }

    pub fn cards(&self) -> &[T] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn total_count(&self) -> usize {
        self.total
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            completed: self.completed,
            total: self.total,
            remaining: self.queue.len(),
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Moves the cursor one card; returns false at either end.
    pub fn advance(&mut self, direction: Direction) -> bool {
        let next = match direction {
            Direction::Previous if self.cursor > 0 => self.cursor - 1,
            Direction::Next if self.cursor + 1 < self.queue.len() => self.cursor + 1,
            _ => return false,
        };
        self.cursor = next;
        self.flipped = false;
        self.observer.on_card_changed(self.cursor);
        true
    }

    /// Switches display mode. Random re-shuffles; both restart from the first card.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        if mode == DisplayMode::Random {
            self.queue.shuffle(&mut self.rng);
        }
        self.cursor = 0;
        self.flipped = false;
        if !self.queue.is_empty() {
            self.observer.on_card_changed(self.cursor);
        }
    }

    /// Jumps to a saved position from an earlier sitting, if it is still valid.
    pub fn restore_cursor(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.queue.len() {
            return false;
        }
        self.cursor = index;
        self.flipped = false;
        self.observer.on_card_changed(self.cursor);
        true
    }

    pub fn feedback_pending(&self) -> bool {
        self.gate_until.is_some_and(|until| Instant::now() < until)
    }

    /// Closes the feedback gate early, e.g. once the host finished its animation.
    pub fn finish_feedback(&mut self) {
        self.gate_until = None;
    }

    /// Records the answer for the current card.
    ///
    /// A remembered card leaves the session. A forgotten one is reinserted at
    /// a uniformly random index, possibly right under the cursor again. The
    /// local queue is authoritative: a failing `on_review` is logged and the
    /// session carries on.
    pub fn mark_outcome(&mut self, remembered: bool) -> Result<Outcome, SessionError> {
        if self.queue.is_empty() {
            return Err(SessionError::Empty);
        }
        if self.feedback_pending() {
            return Err(SessionError::FeedbackPending);
        }

        let card = self.queue.remove(self.cursor);
        let item_id = card.item_id();
        if remembered {
            self.completed += 1;
        } else {
            let position = self.rng.gen_range(0..=self.queue.len());
            self.queue.insert(position, card);
        }
        debug_assert_eq!(self.queue.len() + self.completed, self.total);

        if let Err(e) = self.observer.on_review(item_id, remembered) {
            log::warn!("Failed to save progress for item {}: {}", item_id, e);
        }
        self.observer.on_progress(self.completed, self.total);

        if !self.feedback_gate.is_zero() {
            self.gate_until = Some(Instant::now() + self.feedback_gate);
        }

        if self.queue.is_empty() {
            log::info!("Session complete: {}/{} cards", self.completed, self.total);
            self.observer.on_complete(self.completed, self.total);
            return Ok(Outcome::Complete {
                completed: self.completed,
                total: self.total,
            });
        }

        self.cursor = self.cursor.min(self.queue.len() - 1);
        self.flipped = false;
        self.observer.on_card_changed(self.cursor);
        Ok(Outcome::Continue {
            cursor: self.cursor,
        })
    }
}
