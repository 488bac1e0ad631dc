//! Establish record consensus.

use crate::error::StoreError;
use crate::store::LabelStore;
use crate::{LabelEntry, Record, RecordId};
use itertools::Itertools;
use log::info;
use serde::Serialize;
use std::collections::HashMap;

/// The aggregate written back to a record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Consensus {
    pub num_manual_labels: u32,
    pub manual_label: Option<f64>,
}

/// Given all label entries, compute the consensus for every record with at least one label.
/// The consensus label is the mean of the label scores. Unset labels are not counted.
pub fn compute_consensus(entries: &[LabelEntry]) -> HashMap<RecordId, Consensus> {
    entries
        .iter()
        .filter_map(|entry| entry.label.score().map(|score| (entry.record_id.clone(), score)))
        .into_group_map()
        .into_iter()
        .map(|(record_id, scores)| {
            #[allow(clippy::cast_precision_loss)]
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            let num_manual_labels = u32::try_from(scores.len()).unwrap_or(u32::MAX);
            (
                record_id,
                Consensus {
                    num_manual_labels,
                    manual_label: Some(mean),
                },
            )
        })
        .collect()
}

/// Overwrite the aggregates of `records`: everything is cleared, then records present in
/// `consensus` get their computed values. Returns how many records ended up with a consensus.
pub fn apply_consensus(records: &mut [Record], consensus: &HashMap<RecordId, Consensus>) -> usize {
    let mut num_with_consensus = 0;
    for record in records.iter_mut() {
        let aggregate = consensus.get(&record.id).copied().unwrap_or_default();
        record.num_manual_labels = aggregate.num_manual_labels;
        record.manual_label = aggregate.manual_label;
        if aggregate.manual_label.is_some() {
            num_with_consensus += 1;
        }
    }
    num_with_consensus
}

/// Recompute the consensus of every record in the store.
///
/// # Errors
/// Returns `StoreError::AggregationFailure` if the store could not complete the update; the
/// previous aggregates are left in place.
pub fn recompute<S: LabelStore + ?Sized>(store: &mut S) -> Result<usize, StoreError> {
    let num_with_consensus = store.recompute_consensus()?;
    info!("Consensus recomputed, {num_with_consensus} records have a label.");
    Ok(num_with_consensus)
}
