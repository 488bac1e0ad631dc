//! A library with common utilities for collaborative sentiment labeling.
//!
//! Contributors draw batches of records, label them locally, and upload the
//! labels back to a shared store where a consensus label is recomputed for
//! every record.

pub mod batch;
pub mod config;
pub mod consensus;
pub mod error;
pub mod recorder;
pub mod session;
pub mod store;

#[cfg(feature = "database")]
pub mod db_util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_NUM_OVERLAP: usize = 300;
pub const LEADERBOARD_SIZE: usize = 5;

/// Identifier of a dataset record, as stored in the `id` column.
pub type RecordId = String;

/// Each possible label a contributor can give a record.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Positive,
    Negative,
    Neutral,
    #[default]
    Unset,
}

impl Label {
    /// Numeric encoding used in storage. `Unset` has none.
    pub fn score(self) -> Option<f64> {
        match self {
            Label::Positive => Some(1.0),
            Label::Negative => Some(0.0),
            Label::Neutral => Some(0.5),
            Label::Unset => None,
        }
    }

    /// Decode a stored label value. Anything other than 0, 0.5 or 1 is unset.
    #[allow(clippy::float_cmp)]
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s == 1.0 => Label::Positive,
            Some(s) if s == 0.0 => Label::Negative,
            Some(s) if s == 0.5 => Label::Neutral,
            _ => Label::Unset,
        }
    }

    pub fn is_set(self) -> bool {
        self != Label::Unset
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Positive => "Positive",
            Label::Negative => "Negative",
            Label::Neutral => "Neutral",
            Label::Unset => "No label",
        };
        f.write_str(name)
    }
}

/// A row of the dataset table.
/// `num_manual_labels` and `manual_label` are only ever written by the consensus step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub body: String,
    pub in_overlap: bool,
    pub num_manual_labels: u32,
    pub manual_label: Option<f64>,
}

impl Record {
    /// A freshly loaded record with no labels.
    pub fn new(id: impl Into<RecordId>, body: impl Into<String>, in_overlap: bool) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            in_overlap,
            num_manual_labels: 0,
            manual_label: None,
        }
    }
}

/// One contributor's label for one record.
/// At most one entry exists per (`record_id`, `contributor`); uploading again replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub record_id: RecordId,
    pub contributor: String,
    pub label: Label,
    pub timestamp: DateTime<Utc>,
}

/// How far along the dataset is.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelingStatus {
    pub num_labeled: u64,
    pub num_samples: u64,
}

impl fmt::Display for LabelingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} samples labeled",
            self.num_labeled, self.num_samples
        )
    }
}

/// A contributor and how many label rows they have submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub contributor: String,
    pub num_labels: u64,
}
