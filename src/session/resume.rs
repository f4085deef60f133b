//! Per-collection resume state, saved as JSON between sittings.
//!
//! Remembers the last viewed cursor and which items were already completed in
//! earlier sessions, so the next batch can skip them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CollectionResume {
    #[serde(default)]
    cursor: usize,
    #[serde(default)]
    completed: BTreeSet<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    #[serde(default)]
    collections: BTreeMap<i64, CollectionResume>,
}

impl ResumeState {
    /// Loads the state file; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, ResumeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ResumeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Resume state saved to {:?}", path);
        Ok(())
    }

    pub fn cursor(&self, collection_id: i64) -> usize {
        self.collections
            .get(&collection_id)
            .map(|c| c.cursor)
            .unwrap_or(0)
    }

    pub fn set_cursor(&mut self, collection_id: i64, cursor: usize) {
        self.collections.entry(collection_id).or_default().cursor = cursor;
    }

    pub fn completed_ids(&self, collection_id: i64) -> HashSet<i64> {
        self.collections
            .get(&collection_id)
            .map(|c| c.completed.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Adds a finished batch to the collection's completed set and rewinds its cursor.
    pub fn mark_completed(&mut self, collection_id: i64, ids: impl IntoIterator<Item = i64>) {
        let entry = self.collections.entry(collection_id).or_default();
        entry.completed.extend(ids);
        entry.cursor = 0;
    }

    /// Forgets everything about a collection, so its items come back in the next batch.
    pub fn clear(&mut self, collection_id: i64) {
        self.collections.remove(&collection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = ResumeState::load(&dir.path().join("resume.json")).unwrap();
        assert_eq!(state, ResumeState::default());
        assert_eq!(state.cursor(1), 0);
        assert!(state.completed_ids(1).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("resume.json");

        let mut state = ResumeState::default();
        state.set_cursor(3, 4);
        state.mark_completed(7, [10, 11]);
        state.save(&path).unwrap();

        let loaded = ResumeState::load(&path).unwrap();
        assert_eq!(loaded.cursor(3), 4);
        assert_eq!(loaded.completed_ids(7), [10, 11].into_iter().collect());
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_mark_completed_accumulates_and_rewinds() {
        let mut state = ResumeState::default();
        state.set_cursor(1, 5);
        state.mark_completed(1, [1, 2]);
        state.mark_completed(1, [2, 3]);

        assert_eq!(state.cursor(1), 0);
        assert_eq!(state.completed_ids(1), [1, 2, 3].into_iter().collect());

        state.clear(1);
        assert!(state.completed_ids(1).is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resume.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        assert!(matches!(ResumeState::load(&path), Err(ResumeError::Json(_))));
    }
}
