//! Working labels for a batch, held locally until they are uploaded.

use crate::batch::Batch;
use crate::error::RecorderError;
use crate::{Label, LabelEntry};
use chrono::{DateTime, Utc};

/// Which way to move through a batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Move one step from `position`, clamped to `[0, len - 1]`. No wraparound.
/// An empty batch always yields 0.
pub fn navigate(direction: Direction, position: usize, len: usize) -> usize {
    let Some(last) = len.checked_sub(1) else {
        return 0;
    };
    match direction {
        Direction::Previous => position.saturating_sub(1).min(last),
        Direction::Next => position.saturating_add(1).min(last),
    }
}

/// Per-position labels and edit times for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelRecorder {
    labels: Vec<Label>,
    timestamps: Vec<Option<DateTime<Utc>>>,
    newly_labeled: usize,
}

impl LabelRecorder {
    /// A recorder with every position unset.
    pub fn new(len: usize) -> Self {
        Self {
            labels: vec![Label::Unset; len],
            timestamps: vec![None; len],
            newly_labeled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Record `label` at `position` with the current time.
    ///
    /// # Errors
    /// See [`LabelRecorder::set_label_at`].
    pub fn set_label(&mut self, position: usize, label: Label) -> Result<(), RecorderError> {
        self.set_label_at(position, label, Utc::now())
    }

    /// Record `label` at `position`, overwriting any earlier label there.
    /// The newly-labeled counter only moves the first time a position leaves `Unset`.
    ///
    /// # Errors
    /// Returns an error for `Label::Unset` or a position outside the batch.
    pub fn set_label_at(
        &mut self,
        position: usize,
        label: Label,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RecorderError> {
        if !label.is_set() {
            return Err(RecorderError::UnsetLabel);
        }
        let len = self.len();
        let current = self
            .labels
            .get_mut(position)
            .ok_or(RecorderError::PositionOutOfRange { position, len })?;
        if !current.is_set() {
            self.newly_labeled += 1;
        }
        *current = label;
        self.timestamps[position] = Some(timestamp);
        Ok(())
    }

    /// The working label at `position`, `Unset` outside the batch.
    pub fn label(&self, position: usize) -> Label {
        self.labels.get(position).copied().unwrap_or_default()
    }

    pub fn timestamp(&self, position: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(position).copied().flatten()
    }

    /// How many distinct positions were labeled this session.
    pub fn newly_labeled(&self) -> usize {
        self.newly_labeled
    }

    pub fn navigate(&self, direction: Direction, position: usize) -> usize {
        navigate(direction, position, self.len())
    }

    /// Label entries for every labeled position of `batch`. Unset positions are skipped.
    pub fn entries(&self, batch: &Batch) -> Vec<LabelEntry> {
        batch
            .iter()
            .zip(self.labels.iter().zip(&self.timestamps))
            .filter_map(|(record, (label, timestamp))| {
                let timestamp = (*timestamp)?;
                label.is_set().then(|| LabelEntry {
                    record_id: record.id.clone(),
                    contributor: batch.contributor.clone(),
                    label: *label,
                    timestamp,
                })
            })
            .collect()
    }
}
