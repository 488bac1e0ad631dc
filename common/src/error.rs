//! Error types shared by the stores, the selector and the session.

use thiserror::Error;

/// Failures at the storage boundary.
/// None of these leave partial state behind in the shared tables.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("consensus update rolled back: {0}")]
    AggregationFailure(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Whether a fresh login attempt could fix this.
    pub fn is_login_error(&self) -> bool {
        matches!(
            self,
            StoreError::Authentication(_) | StoreError::NotFound(_) | StoreError::Connection(_)
        )
    }
}

/// Rejected edits to a batch. The recorder is unchanged when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("position {position} is outside the batch of {len} records")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("an unset label cannot be recorded")]
    UnsetLabel,
}
