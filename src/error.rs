//! Errors surfaced by the scheduling engine.
use thiserror::Error;

use crate::database::StoreError;
use crate::models::sm2::InvalidQuality;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Invalid review: {0}")]
    Validation(String),

    #[error("Learner {learner_id} does not own the collection of item {item_id}")]
    AccessDenied { learner_id: i64, item_id: i64 },

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl From<InvalidQuality> for EngineError {
    fn from(err: InvalidQuality) -> Self {
        EngineError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
