//! The labeling loop for one contributor: draw, label, upload, draw again.

use crate::batch::{Batch, BatchSelector, validate_contributor};
use crate::consensus;
use crate::error::{RecorderError, StoreError};
use crate::recorder::{Direction, LabelRecorder};
use crate::store::LabelStore;
use crate::{Label, LabelEntry, Record};
use log::info;

/// Everything a contributor can ask for from the prompt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Previous,
    Next,
    Label(Label),
    Upload,
    Quit,
}

impl Command {
    /// Parse a single-key command, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "w" => Some(Command::Previous),
            "s" => Some(Command::Next),
            "d" => Some(Command::Label(Label::Positive)),
            "a" => Some(Command::Label(Label::Negative)),
            "x" => Some(Command::Label(Label::Neutral)),
            "u" => Some(Command::Upload),
            "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// What the front end should do after a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    UploadRequested,
    QuitRequested,
}

/// Result of a successful upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub records_with_consensus: usize,
    pub next_batch_len: usize,
}

/// One contributor's working state. Owned by a single process and never shared; it only reaches
/// the store through [`Session::upload`].
#[derive(Debug, Clone)]
pub struct Session {
    contributor: String,
    selector: BatchSelector,
    batch: Batch,
    recorder: LabelRecorder,
    position: usize,
}

impl Session {
    /// Log in as `contributor` and draw the first batch.
    ///
    /// # Errors
    /// Returns an error for a blank contributor or if the first draw fails.
    pub fn start<S: LabelStore + ?Sized>(
        store: &mut S,
        selector: BatchSelector,
        contributor: &str,
    ) -> Result<Self, StoreError> {
        let contributor = validate_contributor(contributor)?.to_string();
        let batch = selector.draw(store, &contributor)?;
        Ok(Self {
            contributor,
            selector,
            recorder: LabelRecorder::new(batch.len()),
            batch,
            position: 0,
        })
    }

    pub fn contributor(&self) -> &str {
        &self.contributor
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&Record> {
        self.batch.get(self.position)
    }

    pub fn current_label(&self) -> Label {
        self.recorder.label(self.position)
    }

    pub fn label_at(&self, position: usize) -> Label {
        self.recorder.label(position)
    }

    pub fn newly_labeled(&self) -> usize {
        self.recorder.newly_labeled()
    }

    /// Apply a command to the local state. Uploading and quitting are left to the caller.
    ///
    /// # Errors
    /// Returns an error when labeling in an empty batch.
    pub fn apply(&mut self, command: Command) -> Result<Outcome, RecorderError> {
        match command {
            Command::Previous => {
                self.position = self.recorder.navigate(Direction::Previous, self.position);
            }
            Command::Next => {
                self.position = self.recorder.navigate(Direction::Next, self.position);
            }
            Command::Label(label) => {
                self.recorder.set_label(self.position, label)?;
                self.position = self.recorder.navigate(Direction::Next, self.position);
            }
            Command::Upload => return Ok(Outcome::UploadRequested),
            Command::Quit => return Ok(Outcome::QuitRequested),
        }
        Ok(Outcome::Continue)
    }

    /// Label rows that would be written by an upload right now.
    pub fn pending_entries(&self) -> Vec<LabelEntry> {
        self.recorder.entries(&self.batch)
    }

    /// Upload labeled records, recompute consensus and draw a fresh batch.
    /// On failure the session is left as it was, so the upload can simply be retried; label rows
    /// are upserted, so a retry never duplicates them.
    ///
    /// # Errors
    /// Returns the first store error hit along the way.
    pub fn upload<S: LabelStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<UploadReport, StoreError> {
        let entries = self.pending_entries();
        let uploaded = if entries.is_empty() {
            0
        } else {
            store.upsert_labels(&entries)?
        };
        let records_with_consensus = consensus::recompute(store)?;
        let batch = self.selector.draw(store, &self.contributor)?;
        info!(
            "{} uploaded {uploaded} labels, drew {} new records",
            self.contributor,
            batch.len()
        );

        let next_batch_len = batch.len();
        self.recorder = LabelRecorder::new(batch.len());
        self.batch = batch;
        self.position = 0;
        Ok(UploadReport {
            uploaded,
            records_with_consensus,
            next_batch_len,
        })
    }
}
