//! Assembles the batch for a new sitting.
use std::collections::HashSet;

use super::queue::StudyCard;

/// Keeps candidates in order, skipping ids completed in earlier sessions and
/// capping the batch at `size` cards (`0` means no cap).
pub fn plan_batch<T: StudyCard>(
    candidates: impl IntoIterator<Item = T>,
    exclude: &HashSet<i64>,
    size: usize,
) -> Vec<T> {
    let remaining = candidates
        .into_iter()
        .filter(|card| !exclude.contains(&card.item_id()));

    if size == 0 {
        remaining.collect()
    } else {
        remaining.take(size).collect()
    }
}
