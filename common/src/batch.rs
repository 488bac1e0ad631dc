//! Decide which records a contributor should label next.

use crate::config::LabelerConfig;
use crate::error::StoreError;
use crate::store::LabelStore;
use crate::{LabelEntry, Record};
use log::{debug, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;

/// An ordered set of records drawn for one contributor.
/// Nothing is reserved by drawing it, so other contributors may be handed the same records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Batch {
    pub contributor: String,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

/// Draws batches of at most `batch_size` records from a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSelector {
    batch_size: usize,
}

impl BatchSelector {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    pub fn from_config(config: &LabelerConfig) -> Self {
        Self::new(config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Draw the next batch for `contributor`. An empty batch means there is nothing left for them.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` for a blank contributor, otherwise whatever the store
    /// reports. No partial batch is ever returned.
    pub fn draw<S: LabelStore + ?Sized>(
        &self,
        store: &mut S,
        contributor: &str,
    ) -> Result<Batch, StoreError> {
        let contributor = validate_contributor(contributor)?;
        let mut records = store.candidates(contributor, self.batch_size)?;
        if records.len() > self.batch_size {
            warn!(
                "Store returned {} candidates for a batch of {}, truncating.",
                records.len(),
                self.batch_size
            );
            records.truncate(self.batch_size);
        }
        debug!(
            "Drew {} records for {contributor} ({} in the overlap pool)",
            records.len(),
            records.iter().filter(|r| r.in_overlap).count()
        );
        Ok(Batch {
            contributor: contributor.to_string(),
            records,
        })
    }
}

/// Trim a contributor name, rejecting blank ones.
///
/// # Errors
/// Returns `StoreError::InvalidInput` if nothing is left after trimming.
pub fn validate_contributor(contributor: &str) -> Result<&str, StoreError> {
    let trimmed = contributor.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(
            "contributor must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Whether `record` still needs a label from a contributor who has labeled `labeled_by_contributor`.
/// Records without consensus are open to everyone; overlap records stay open to each contributor
/// until that contributor has labeled them, whatever the consensus says.
pub fn needs_label(record: &Record, labeled_by_contributor: &HashSet<&str>) -> bool {
    record.manual_label.is_none()
        || (record.in_overlap && !labeled_by_contributor.contains(record.id.as_str()))
}

/// Pick up to `batch_size` records for `contributor`: overlap records first, random order within
/// each group.
pub fn select_batch<R: Rng + ?Sized>(
    records: &[Record],
    labels: &[LabelEntry],
    contributor: &str,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Record> {
    let labeled_by_contributor: HashSet<&str> = labels
        .iter()
        .filter(|entry| entry.contributor == contributor)
        .map(|entry| entry.record_id.as_str())
        .collect();

    let mut candidates: Vec<Record> = records
        .iter()
        .filter(|record| needs_label(record, &labeled_by_contributor))
        .cloned()
        .collect();

    // shuffle first, the stable sort keeps the random order inside each group
    candidates.shuffle(rng);
    candidates.sort_by_key(|record| Reverse(record.in_overlap));
    candidates.truncate(batch_size);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Label;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn create_test_records(num_records: usize, num_overlap: usize) -> Vec<Record> {
        (0..num_records)
            .map(|i| Record::new(format!("r{i:03}"), format!("body {i}"), i < num_overlap))
            .collect()
    }

    fn create_test_entry(record_id: &str, contributor: &str, label: Label) -> LabelEntry {
        LabelEntry {
            record_id: record_id.to_string(),
            contributor: contributor.to_string(),
            label,
            timestamp: Utc::now(),
        }
    }

    #[test_log::test]
    fn test_select_batch_overlap_first() {
        let records = create_test_records(20, 5);
        let mut rng = StdRng::seed_from_u64(7);

        let batch = select_batch(&records, &[], "alice", 10, &mut rng);

        assert_eq!(batch.len(), 10);
        assert!(batch[..5].iter().all(|r| r.in_overlap));
        assert!(batch[5..].iter().all(|r| !r.in_overlap));
    }

    #[test_log::test]
    fn test_select_batch_bound() {
        let records = create_test_records(50, 10);
        let mut rng = StdRng::seed_from_u64(1);
        for batch_size in [0, 1, 9, 10, 11, 50, 100] {
            let batch = select_batch(&records, &[], "alice", batch_size, &mut rng);
            assert_eq!(batch.len(), batch_size.min(records.len()));
        }
    }

    #[test_log::test]
    fn test_select_batch_excludes_consensus_outside_overlap() {
        let mut records = create_test_records(4, 2);
        records[2].manual_label = Some(1.0);
        records[2].num_manual_labels = 1;
        let mut rng = StdRng::seed_from_u64(3);

        let batch = select_batch(&records, &[], "alice", 10, &mut rng);
        let ids: HashSet<&str> = batch.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, HashSet::from(["r000", "r001", "r003"]));
    }

    #[test_log::test]
    fn test_select_batch_overlap_ignores_consensus_until_labeled() {
        let mut records = create_test_records(2, 2);
        for record in &mut records {
            record.manual_label = Some(0.0);
            record.num_manual_labels = 1;
        }
        let labels = vec![
            create_test_entry("r000", "alice", Label::Negative),
            create_test_entry("r001", "alice", Label::Negative),
        ];
        let mut rng = StdRng::seed_from_u64(11);

        assert!(select_batch(&records, &labels, "alice", 10, &mut rng).is_empty());
        assert_eq!(select_batch(&records, &labels, "bob", 10, &mut rng).len(), 2);
    }

    #[test_log::test]
    fn test_select_batch_random_within_group() {
        let records = create_test_records(30, 0);
        let first = select_batch(&records, &[], "alice", 30, &mut StdRng::seed_from_u64(1));
        let second = select_batch(&records, &[], "alice", 30, &mut StdRng::seed_from_u64(2));

        let mut first_ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
        let mut second_ids: Vec<&str> = second.iter().map(|r| r.id.as_str()).collect();
        assert_ne!(first_ids, second_ids);
        first_ids.sort_unstable();
        second_ids.sort_unstable();
        assert_eq!(first_ids, second_ids);
    }

    #[test_log::test]
    fn test_draw_rejects_blank_contributor() {
        let mut store = MemoryStore::with_seed(create_test_records(3, 3), 0);
        let selector = BatchSelector::new(10);

        let result = selector.draw(&mut store, "   ");

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test_log::test]
    fn test_draw_trims_contributor() {
        let mut store = MemoryStore::with_seed(create_test_records(3, 3), 0);
        let selector = BatchSelector::new(2);

        let batch = selector.draw(&mut store, " alice ").unwrap();

        assert_eq!(batch.contributor, "alice");
        assert_eq!(batch.len(), 2);
    }

    /// A store that ignores the limit it is given.
    struct OverfullStore(Vec<Record>);

    impl LabelStore for OverfullStore {
        fn candidates(&mut self, _: &str, _: usize) -> Result<Vec<Record>, StoreError> {
            Ok(self.0.clone())
        }
        fn upsert_labels(&mut self, entries: &[LabelEntry]) -> Result<usize, StoreError> {
            Ok(entries.len())
        }
        fn recompute_consensus(&mut self) -> Result<usize, StoreError> {
            Ok(0)
        }
        fn status(&mut self) -> Result<crate::LabelingStatus, StoreError> {
            Ok(crate::LabelingStatus::default())
        }
        fn leaderboard(&mut self, _: usize) -> Result<Vec<crate::LeaderboardEntry>, StoreError> {
            Ok(Vec::new())
        }
        fn mark_overlap_pool(&mut self, _: usize) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[test_log::test]
    fn test_draw_truncates_overfull_store() {
        let mut store = OverfullStore(create_test_records(8, 0));
        let batch = BatchSelector::new(3).draw(&mut store, "alice").unwrap();
        assert_eq!(batch.len(), 3);
    }
}
