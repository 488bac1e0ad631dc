//! The storage interface the selector, consensus and session run against.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::{LabelEntry, LabelingStatus, LeaderboardEntry, Record};
use std::collections::HashMap;

/// A shared dataset of records plus the label rows contributors have uploaded.
///
/// Implementations are handed to callers explicitly; nothing here holds global state.
pub trait LabelStore {
    /// Up to `limit` records `contributor` should label next, overlap records first and random
    /// within each group.
    fn candidates(&mut self, contributor: &str, limit: usize) -> Result<Vec<Record>, StoreError>;

    /// Insert or replace one label row per (record, contributor). Returns the rows written.
    /// Either every entry is stored or none is.
    fn upsert_labels(&mut self, entries: &[LabelEntry]) -> Result<usize, StoreError>;

    /// Clear and rewrite the aggregate of every record in one atomic step.
    /// Returns how many records have a consensus afterwards.
    fn recompute_consensus(&mut self) -> Result<usize, StoreError>;

    fn status(&mut self) -> Result<LabelingStatus, StoreError>;

    /// The `limit` contributors with the most label rows.
    fn leaderboard(&mut self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;

    /// Flag the first `num_overlap` records by id as the overlap pool and clear the flag on the
    /// rest. Returns how many records were flagged.
    fn mark_overlap_pool(&mut self, num_overlap: usize) -> Result<usize, StoreError>;
}

/// Collapse entries to the last one given for each (record, contributor) and reject unset
/// labels, so a single upload can never write duplicate rows.
///
/// # Errors
/// Returns `StoreError::InvalidInput` if any entry is unset or names a blank contributor.
pub fn latest_entries(entries: &[LabelEntry]) -> Result<Vec<&LabelEntry>, StoreError> {
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
    let mut latest: Vec<&LabelEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !entry.label.is_set() {
            return Err(StoreError::InvalidInput(format!(
                "unset label for record {}",
                entry.record_id
            )));
        }
        if entry.contributor.trim().is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "blank contributor for record {}",
                entry.record_id
            )));
        }
        let key = (entry.record_id.as_str(), entry.contributor.as_str());
        match positions.get(&key) {
            Some(&i) => latest[i] = entry,
            None => {
                positions.insert(key, latest.len());
                latest.push(entry);
            }
        }
    }
    Ok(latest)
}
