//! Item is a vocabulary pair <term, definition> owned by a collection
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub collection_id: i64,
    pub term: String,
    pub definition: String,
}

/// A named set of items belonging to one learner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    pub learner_id: i64,
    pub name: String,
}
