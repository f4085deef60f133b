//! Review record storage.
//!
//! The scheduling engine only talks to storage through the [`ReviewStore`]
//! trait. [`db::SqliteStore`] is the durable implementation.

pub mod db;

pub use db::SqliteStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{CollectionProgress, Item, ReviewRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// An item together with the learner's record for it.
pub type ItemProgress = (Item, ReviewRecord);

/// Outcome of [`ReviewStore::get_or_create_record`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordEntry {
    /// A record already existed; nothing was written.
    Existing(ReviewRecord),
    /// No record existed; the fresh record was inserted.
    Created(ReviewRecord),
}

/// Operations the scheduling engine needs from a durable record store.
///
/// At most one record exists per (learner, item). Implementations do not
/// need to make a read followed by a write atomic: callers accept
/// last-write-wins for concurrent reviews of the same pair.
pub trait ReviewStore: Send + Sync {
    fn item(&self, item_id: i64) -> Result<Option<Item>>;

    /// Learner owning the collection, `None` if the collection is unknown.
    fn collection_owner(&self, collection_id: i64) -> Result<Option<i64>>;

    fn get_record(&self, learner_id: i64, item_id: i64) -> Result<Option<ReviewRecord>>;

    /// Returns the existing record, or inserts `fresh` when there is none.
    fn get_or_create_record(
        &self,
        learner_id: i64,
        item_id: i64,
        fresh: ReviewRecord,
    ) -> Result<RecordEntry>;

    /// Overwrites the record of an existing pair (upsert semantics).
    fn put_record(&self, learner_id: i64, item_id: i64, record: &ReviewRecord) -> Result<()>;

    /// Removes the record; returns whether one existed.
    fn delete_record(&self, learner_id: i64, item_id: i64) -> Result<bool>;

    /// Records with `next_review_at <= now`, most overdue first.
    fn due_records(&self, learner_id: i64, now: DateTime<Utc>, limit: usize)
    -> Result<Vec<ItemProgress>>;

    /// Records with the given `remembered` flag, most recently reviewed first.
    fn records_by_outcome(&self, learner_id: i64, remembered: bool) -> Result<Vec<ItemProgress>>;

    /// Every record of the learner, ascending by `next_review_at`.
    fn all_records(&self, learner_id: i64) -> Result<Vec<ItemProgress>>;

    /// Items in collections owned by the learner.
    fn count_owned_items(&self, learner_id: i64) -> Result<u64>;

    fn count_records(&self, learner_id: i64, remembered: bool) -> Result<u64>;

    /// Total and learned counts for each collection owned by the learner.
    fn collection_progress(&self, learner_id: i64) -> Result<Vec<CollectionProgress>>;
}
