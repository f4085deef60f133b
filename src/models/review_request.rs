//! Review submission as it arrives from a host, before validation.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(alias = "itemId")]
    pub item_id: Option<i64>,
    pub remembered: Option<bool>,
    pub quality: Option<u8>,
}

impl ReviewRequest {
    pub fn new(item_id: i64, remembered: bool) -> Self {
        Self {
            item_id: Some(item_id),
            remembered: Some(remembered),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }
}
