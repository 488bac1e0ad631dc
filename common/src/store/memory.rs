//! An in-process store, used for tests and offline dry runs.

use super::{LabelStore, latest_entries};
use crate::batch::select_batch;
use crate::consensus::{apply_consensus, compute_consensus};
use crate::error::StoreError;
use crate::{LabelEntry, LabelingStatus, LeaderboardEntry, Record};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Records and label rows held in memory.
/// Every operation either completes or leaves the store untouched.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Vec<Record>,
    labels: Vec<LabelEntry>,
    rng: StdRng,
    offline: bool,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self::with_rng(records, StdRng::from_os_rng())
    }

    /// A store whose batch order is reproducible.
    pub fn with_seed(records: Vec<Record>, seed: u64) -> Self {
        Self::with_rng(records, StdRng::seed_from_u64(seed))
    }

    fn with_rng(records: Vec<Record>, rng: StdRng) -> Self {
        Self {
            records,
            labels: Vec::new(),
            rng,
            offline: false,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn labels(&self) -> &[LabelEntry] {
        &self.labels
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Simulate an unreachable backend: every operation fails with a connection error.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Connection("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LabelStore for MemoryStore {
    fn candidates(&mut self, contributor: &str, limit: usize) -> Result<Vec<Record>, StoreError> {
        self.ensure_online()?;
        Ok(select_batch(
            &self.records,
            &self.labels,
            contributor,
            limit,
            &mut self.rng,
        ))
    }

    fn upsert_labels(&mut self, entries: &[LabelEntry]) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let latest = latest_entries(entries)?;
        for entry in &latest {
            match self
                .labels
                .iter_mut()
                .find(|l| l.record_id == entry.record_id && l.contributor == entry.contributor)
            {
                Some(existing) => *existing = (*entry).clone(),
                None => self.labels.push((*entry).clone()),
            }
        }
        debug!("Upserted {} label rows", latest.len());
        Ok(latest.len())
    }

    fn recompute_consensus(&mut self) -> Result<usize, StoreError> {
        self.ensure_online()
            .map_err(|e| StoreError::AggregationFailure(e.to_string()))?;
        let consensus = compute_consensus(&self.labels);
        Ok(apply_consensus(&mut self.records, &consensus))
    }

    fn status(&mut self) -> Result<LabelingStatus, StoreError> {
        self.ensure_online()?;
        let num_labeled = self
            .records
            .iter()
            .filter(|r| r.manual_label.is_some())
            .count();
        Ok(LabelingStatus {
            num_labeled: num_labeled as u64,
            num_samples: self.records.len() as u64,
        })
    }

    fn leaderboard(&mut self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.ensure_online()?;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for entry in &self.labels {
            *counts.entry(entry.contributor.as_str()).or_insert(0) += 1;
        }
        let mut leaderboard: Vec<LeaderboardEntry> = counts
            .into_iter()
            .map(|(contributor, num_labels)| LeaderboardEntry {
                contributor: contributor.to_string(),
                num_labels,
            })
            .collect();
        leaderboard.sort_by(|a, b| {
            Reverse(a.num_labels)
                .cmp(&Reverse(b.num_labels))
                .then_with(|| a.contributor.cmp(&b.contributor))
        });
        leaderboard.truncate(limit);
        Ok(leaderboard)
    }

    fn mark_overlap_pool(&mut self, num_overlap: usize) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| self.records[a].id.cmp(&self.records[b].id));
        for (rank, index) in order.into_iter().enumerate() {
            self.records[index].in_overlap = rank < num_overlap;
        }
        Ok(num_overlap.min(self.records.len()))
    }
}
