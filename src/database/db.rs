//! SQLite review record store
//!
//! Handles database initialization, the minimal collection/item inserts hosts
//! need to populate data, and persistence of per-learner review records.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{ItemProgress, RecordEntry, Result, ReviewStore, StoreError};
use crate::models::{Collection, CollectionProgress, Item, ReviewRecord};

const SELECT_PROGRESS: &str = "SELECT i.id, i.collection_id, i.term, i.definition,
        r.remembered, r.review_count, r.last_reviewed_at, r.next_review_at,
        r.ease_factor, r.interval_days, r.is_favorite
     FROM review_records r
     JOIN items i ON i.id = r.item_id";

/// SQLite-backed record store.
///
/// The connection is shared behind a mutex; every trait call takes the lock
/// for the duration of a single statement group.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and its tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    log::warn!("Failed to create database directory {:?}: {}", parent, e);
                }
            }
        }

        let conn = Connection::open(path)?;
        log::debug!("Opened review database at {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Creates tables for collections, items and review records.
    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(learner_id, name)
            )",
            (),
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_id INTEGER NOT NULL,
                term TEXT NOT NULL,
                definition TEXT NOT NULL,
                FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
                UNIQUE(collection_id, term)
            )",
            (),
        )?;

        // One row per (learner, item); absent until the first review or favorite
        conn.execute(
            "CREATE TABLE IF NOT EXISTS review_records (
                learner_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                remembered INTEGER NOT NULL DEFAULT 0,
                review_count INTEGER NOT NULL DEFAULT 0,
                last_reviewed_at INTEGER,
                next_review_at INTEGER,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (learner_id, item_id),
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
            )",
            (),
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_review_records_next
             ON review_records (learner_id, next_review_at)",
            (),
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Creates a collection for a learner and returns its id.
    ///
    /// An existing collection with the same name is reused.
    pub fn add_collection(&self, learner_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collections (learner_id, name) VALUES (?1, ?2)",
            params![learner_id, name],
        )?;
        if inserted > 0 {
            log::info!("Collection '{}' created for learner {}", name, learner_id);
        }

        let id = conn.query_row(
            "SELECT id FROM collections WHERE learner_id = ?1 AND name = ?2",
            params![learner_id, name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Adds an item to a collection and returns its id.
    ///
    /// If the collection already has an item with the same term, it's reused
    /// due to the UNIQUE constraint. No review record is created.
    pub fn add_item(&self, collection_id: i64, term: &str, definition: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO items (collection_id, term, definition) VALUES (?1, ?2, ?3)",
            params![collection_id, term, definition],
        )?;

        let id = conn.query_row(
            "SELECT id FROM items WHERE collection_id = ?1 AND term = ?2",
            params![collection_id, term],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn collections(&self, learner_id: i64) -> Result<Vec<Collection>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, learner_id, name FROM collections WHERE learner_id = ?1 ORDER BY id",
        )?;
        let collections = stmt
            .query_map(params![learner_id], |row| {
                Ok(Collection {
                    id: row.get(0)?,
                    learner_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    /// Items of a collection in insertion order.
    pub fn items_in_collection(&self, collection_id: i64) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, collection_id, term, definition FROM items
             WHERE collection_id = ?1 ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![collection_id], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn query_progress(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<ItemProgress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, progress_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn to_secs(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

/// Reads an optional unix-seconds column, rejecting values chrono cannot represent.
fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|secs| {
            DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Integer,
                    format!("timestamp {} out of range", secs).into(),
                )
            })
        })
        .transpose()
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        term: row.get(2)?,
        definition: row.get(3)?,
    })
}

/// Maps the record columns starting at `offset`.
fn record_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        remembered: row.get(offset)?,
        review_count: row.get(offset + 1)?,
        last_reviewed_at: timestamp_at(row, offset + 2)?,
        next_review_at: timestamp_at(row, offset + 3)?,
        ease_factor: row.get(offset + 4)?,
        interval_days: row.get(offset + 5)?,
        is_favorite: row.get(offset + 6)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ItemProgress> {
    Ok((item_from_row(row)?, record_from_row(row, 4)?))
}

fn select_record(conn: &Connection, learner_id: i64, item_id: i64) -> Result<Option<ReviewRecord>> {
    let record = conn
        .query_row(
            "SELECT remembered, review_count, last_reviewed_at, next_review_at,
                    ease_factor, interval_days, is_favorite
             FROM review_records WHERE learner_id = ?1 AND item_id = ?2",
            params![learner_id, item_id],
            |row| record_from_row(row, 0),
        )
        .optional()?;
    Ok(record)
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<u64> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

impl ReviewStore for SqliteStore {
    fn item(&self, item_id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                "SELECT id, collection_id, term, definition FROM items WHERE id = ?1",
                params![item_id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn collection_owner(&self, collection_id: i64) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let owner = conn
            .query_row(
                "SELECT learner_id FROM collections WHERE id = ?1",
                params![collection_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn get_record(&self, learner_id: i64, item_id: i64) -> Result<Option<ReviewRecord>> {
        let conn = self.conn()?;
        select_record(&conn, learner_id, item_id)
    }

    fn get_or_create_record(
        &self,
        learner_id: i64,
        item_id: i64,
        fresh: ReviewRecord,
    ) -> Result<RecordEntry> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO review_records
                (learner_id, item_id, remembered, review_count, last_reviewed_at,
                 next_review_at, ease_factor, interval_days, is_favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                learner_id,
                item_id,
                fresh.remembered,
                fresh.review_count,
                fresh.last_reviewed_at.map(to_secs),
                fresh.next_review_at.map(to_secs),
                fresh.ease_factor,
                fresh.interval_days,
                fresh.is_favorite,
            ],
        )?;

        if inserted > 0 {
            return Ok(RecordEntry::Created(fresh));
        }

        match select_record(&conn, learner_id, item_id)? {
            Some(existing) => Ok(RecordEntry::Existing(existing)),
            // Deleted between the insert and the select by another writer
            None => Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    }

    fn put_record(&self, learner_id: i64, item_id: i64, record: &ReviewRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO review_records
                (learner_id, item_id, remembered, review_count, last_reviewed_at,
                 next_review_at, ease_factor, interval_days, is_favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (learner_id, item_id) DO UPDATE SET
                remembered = excluded.remembered,
                review_count = excluded.review_count,
                last_reviewed_at = excluded.last_reviewed_at,
                next_review_at = excluded.next_review_at,
                ease_factor = excluded.ease_factor,
                interval_days = excluded.interval_days,
                is_favorite = excluded.is_favorite",
            params![
                learner_id,
                item_id,
                record.remembered,
                record.review_count,
                record.last_reviewed_at.map(to_secs),
                record.next_review_at.map(to_secs),
                record.ease_factor,
                record.interval_days,
                record.is_favorite,
            ],
        )?;
        Ok(())
    }

    fn delete_record(&self, learner_id: i64, item_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM review_records WHERE learner_id = ?1 AND item_id = ?2",
            params![learner_id, item_id],
        )?;
        Ok(removed > 0)
    }

    fn due_records(
        &self,
        learner_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ItemProgress>> {
        let sql = format!(
            "{SELECT_PROGRESS}
             WHERE r.learner_id = ?1 AND r.next_review_at IS NOT NULL AND r.next_review_at <= ?2
             ORDER BY r.next_review_at ASC
             LIMIT ?3"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_progress(&sql, params![learner_id, to_secs(now), limit])
    }

    fn records_by_outcome(&self, learner_id: i64, remembered: bool) -> Result<Vec<ItemProgress>> {
        let sql = format!(
            "{SELECT_PROGRESS}
             WHERE r.learner_id = ?1 AND r.remembered = ?2
             ORDER BY r.last_reviewed_at DESC"
        );
        self.query_progress(&sql, params![learner_id, remembered])
    }

    fn all_records(&self, learner_id: i64) -> Result<Vec<ItemProgress>> {
        let sql = format!(
            "{SELECT_PROGRESS}
             WHERE r.learner_id = ?1
             ORDER BY r.next_review_at ASC"
        );
        self.query_progress(&sql, params![learner_id])
    }

    fn count_owned_items(&self, learner_id: i64) -> Result<u64> {
        let conn = self.conn()?;
        count(
            &conn,
            "SELECT COUNT(*) FROM items i
             JOIN collections c ON c.id = i.collection_id
             WHERE c.learner_id = ?1",
            params![learner_id],
        )
    }

    fn count_records(&self, learner_id: i64, remembered: bool) -> Result<u64> {
        let conn = self.conn()?;
        count(
            &conn,
            "SELECT COUNT(*) FROM review_records WHERE learner_id = ?1 AND remembered = ?2",
            params![learner_id, remembered],
        )
    }

    fn collection_progress(&self, learner_id: i64) -> Result<Vec<CollectionProgress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, COUNT(i.id),
                    COALESCE(SUM(CASE WHEN r.remembered = 1 THEN 1 ELSE 0 END), 0)
             FROM collections c
             LEFT JOIN items i ON i.collection_id = c.id
             LEFT JOIN review_records r ON r.item_id = i.id AND r.learner_id = ?1
             WHERE c.learner_id = ?1
             GROUP BY c.id, c.name
             ORDER BY c.id",
        )?;
        let progress = stmt
            .query_map(params![learner_id], |row| {
                let total: i64 = row.get(2)?;
                let learned: i64 = row.get(3)?;
                Ok(CollectionProgress::new(
                    row.get(0)?,
                    row.get(1)?,
                    total.max(0) as u64,
                    learned.max(0) as u64,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap()
    }

    fn store_with_items(terms: &[&str]) -> (SqliteStore, Vec<i64>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let collection = store.add_collection(1, "Polish Vocabulary").unwrap();
        let ids = terms
            .iter()
            .map(|term| store.add_item(collection, term, "meaning").unwrap())
            .collect();
        (store, ids)
    }

    fn record_due_at(at: DateTime<Utc>, remembered: bool) -> ReviewRecord {
        ReviewRecord {
            remembered,
            review_count: 1,
            last_reviewed_at: Some(at - Duration::days(1)),
            next_review_at: Some(at),
            ..ReviewRecord::default()
        }
    }

    #[test]
    fn test_add_item_is_idempotent_per_term() {
        let (store, ids) = store_with_items(&["cześć"]);
        let collection = store.add_collection(1, "Polish Vocabulary").unwrap();
        let again = store.add_item(collection, "cześć", "hi").unwrap();

        assert_eq!(ids[0], again);
        assert_eq!(store.items_in_collection(collection).unwrap().len(), 1);
    }

    #[test]
    fn test_items_do_not_get_records_eagerly() {
        let (store, ids) = store_with_items(&["cześć", "proszę"]);
        assert_eq!(store.get_record(1, ids[0]).unwrap(), None);
        assert_eq!(store.count_owned_items(1).unwrap(), 2);
        assert_eq!(store.count_owned_items(2).unwrap(), 0);
    }

    #[test]
    fn test_get_or_create_then_existing() {
        let (store, ids) = store_with_items(&["cześć"]);
        let fresh = ReviewRecord::favorited(now());

        let created = store.get_or_create_record(1, ids[0], fresh.clone()).unwrap();
        assert_eq!(created, RecordEntry::Created(fresh.clone()));

        let other = ReviewRecord::default();
        let existing = store.get_or_create_record(1, ids[0], other).unwrap();
        assert_eq!(existing, RecordEntry::Existing(fresh));
    }

    #[test]
    fn test_put_record_round_trips_fields() {
        let (store, ids) = store_with_items(&["cześć"]);
        let record = ReviewRecord {
            remembered: true,
            review_count: 3,
            last_reviewed_at: Some(now()),
            next_review_at: Some(now() + Duration::days(15)),
            ease_factor: 2.36,
            interval_days: 15,
            is_favorite: true,
        };

        store.put_record(1, ids[0], &record).unwrap();
        assert_eq!(store.get_record(1, ids[0]).unwrap(), Some(record));
    }

    #[test]
    fn test_records_are_per_learner() {
        let (store, ids) = store_with_items(&["cześć"]);
        store
            .put_record(1, ids[0], &record_due_at(now(), true))
            .unwrap();

        assert!(store.get_record(2, ids[0]).unwrap().is_none());
        assert_eq!(store.count_records(1, true).unwrap(), 1);
        assert_eq!(store.count_records(2, true).unwrap(), 0);
    }

    #[test]
    fn test_due_records_ordered_and_limited() {
        let (store, ids) = store_with_items(&["a", "b", "c", "d"]);
        store.put_record(1, ids[0], &record_due_at(now() - Duration::hours(1), false)).unwrap();
        store.put_record(1, ids[1], &record_due_at(now() - Duration::days(3), true)).unwrap();
        store.put_record(1, ids[2], &record_due_at(now() + Duration::days(1), true)).unwrap();
        store.put_record(1, ids[3], &record_due_at(now(), false)).unwrap();

        let due = store.due_records(1, now(), 20).unwrap();
        let order: Vec<i64> = due.iter().map(|(item, _)| item.id).collect();
        assert_eq!(order, vec![ids[1], ids[0], ids[3]]);

        let capped = store.due_records(1, now(), 2).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].0.id, ids[1]);
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_error() {
        let (store, ids) = store_with_items(&["cześć"]);
        store.put_record(1, ids[0], &record_due_at(now(), false)).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE review_records SET next_review_at = ?1",
                params![i64::MAX],
            )
            .unwrap();

        let err = store.get_record(1, ids[0]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, _))
        ));
        assert!(store.all_records(1).is_err());
    }

    #[test]
    fn test_delete_record() {
        let (store, ids) = store_with_items(&["a"]);
        store.put_record(1, ids[0], &record_due_at(now(), true)).unwrap();

        assert!(store.delete_record(1, ids[0]).unwrap());
        assert!(!store.delete_record(1, ids[0]).unwrap());
        assert!(store.get_record(1, ids[0]).unwrap().is_none());
    }

    #[test]
    fn test_collection_progress_counts_learned() {
        let (store, ids) = store_with_items(&["a", "b"]);
        store.add_collection(1, "Empty").unwrap();
        store.put_record(1, ids[0], &record_due_at(now(), true)).unwrap();
        store.put_record(1, ids[1], &record_due_at(now(), false)).unwrap();
        // Another learner's progress must not count
        store.put_record(2, ids[1], &record_due_at(now(), true)).unwrap();

        let progress = store.collection_progress(1).unwrap();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].name, "Polish Vocabulary");
        assert_eq!(progress[0].total, 2);
        assert_eq!(progress[0].learned, 1);
        assert!(!progress[0].is_completed);
        assert_eq!(progress[1].total, 0);
        assert!(!progress[1].is_completed);
    }

    #[test]
    fn test_collection_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let collection = store.add_collection(9, "Mine").unwrap();
        assert_eq!(store.collection_owner(collection).unwrap(), Some(9));
        assert_eq!(store.collection_owner(collection + 100).unwrap(), None);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("reviews.sqlite3");

        let item_id = {
            let store = SqliteStore::open(&path).unwrap();
            let collection = store.add_collection(1, "Persisted").unwrap();
            let id = store.add_item(collection, "dziękuję", "thank you").unwrap();
            store.put_record(1, id, &record_due_at(now(), true)).unwrap();
            id
        };

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.get_record(1, item_id).unwrap().is_some());
    }
}
