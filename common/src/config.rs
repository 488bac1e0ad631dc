//! Options describing where the dataset lives and how batches are sized.

use crate::error::StoreError;
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_NUM_OVERLAP};
use clap::Args;
use serde::Serialize;

pub const DEFAULT_REPO_OWNER: &str = "labeler";
pub const DEFAULT_REPO: &str = "sentiment";
pub const DEFAULT_DATASET_TABLE: &str = "comments_sample";
pub const DEFAULT_LABEL_TABLE: &str = "comments_sample_manual_labels";
pub const DEFAULT_LABEL_COL: &str = "manual_label";

#[derive(Args, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelerConfig {
    /// Owner of the repository that holds the tables
    #[arg(long, default_value = DEFAULT_REPO_OWNER, env = "LABELER_REPO_OWNER")]
    pub repo_owner: String,

    /// Repository (schema) that holds the tables
    #[arg(long, default_value = DEFAULT_REPO, env = "LABELER_REPO")]
    pub repo: String,

    /// Table with the records to label
    #[arg(long, default_value = DEFAULT_DATASET_TABLE, env = "LABELER_DATASET_TABLE")]
    pub dataset_table: String,

    /// Table receiving one row per contributor label
    #[arg(long, default_value = DEFAULT_LABEL_TABLE, env = "LABELER_LABEL_TABLE")]
    pub label_table: String,

    /// Column holding the label value in both tables
    #[arg(long, default_value = DEFAULT_LABEL_COL, env = "LABELER_LABEL_COL")]
    pub label_col: String,

    /// Maximum number of records per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "LABELER_BATCH_SIZE")]
    pub batch_size: usize,

    /// Number of records every contributor labels for agreement checks
    #[arg(long, default_value_t = DEFAULT_NUM_OVERLAP, env = "LABELER_NUM_OVERLAP")]
    pub num_overlap: usize,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            repo_owner: DEFAULT_REPO_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            dataset_table: DEFAULT_DATASET_TABLE.to_string(),
            label_table: DEFAULT_LABEL_TABLE.to_string(),
            label_col: DEFAULT_LABEL_COL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            num_overlap: DEFAULT_NUM_OVERLAP,
        }
    }
}

impl LabelerConfig {
    /// Reject configurations no store could serve.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` naming the offending option.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (name, value) in [
            ("dataset_table", &self.dataset_table),
            ("label_table", &self.label_table),
            ("label_col", &self.label_col),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::InvalidInput(format!("{name} must not be empty")));
            }
        }
        if self.dataset_table == self.label_table {
            return Err(StoreError::InvalidInput(
                "dataset_table and label_table must differ".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(StoreError::InvalidInput(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The schema holding both tables, `owner/repo`.
    /// Falls back to whichever half is set, or `None` for the connection's current schema.
    pub fn schema(&self) -> Option<String> {
        match (self.repo_owner.trim(), self.repo.trim()) {
            ("", "") => None,
            (owner, "") => Some(owner.to_string()),
            ("", repo) => Some(repo.to_string()),
            (owner, repo) => Some(format!("{owner}/{repo}")),
        }
    }

    pub fn qualified_dataset_table(&self) -> String {
        fully_qualified(self.schema().as_deref(), &self.dataset_table)
    }

    pub fn qualified_label_table(&self) -> String {
        fully_qualified(self.schema().as_deref(), &self.label_table)
    }

    pub fn quoted_label_col(&self) -> String {
        quote_ident(&self.label_col)
    }
}

/// Quote an identifier for Postgres, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn fully_qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_qualified_names() {
        let config = LabelerConfig::default();
        assert_eq!(
            config.qualified_dataset_table(),
            "\"labeler/sentiment\".\"comments_sample\""
        );
        assert_eq!(
            config.qualified_label_table(),
            "\"labeler/sentiment\".\"comments_sample_manual_labels\""
        );
        assert_eq!(config.quoted_label_col(), "\"manual_label\"");
    }

    #[test]
    fn test_schema_fallbacks() {
        let mut config = LabelerConfig {
            repo_owner: String::new(),
            ..LabelerConfig::default()
        };
        assert_eq!(config.schema().as_deref(), Some("sentiment"));
        config.repo = String::new();
        assert_eq!(config.schema(), None);
        assert_eq!(config.qualified_dataset_table(), "\"comments_sample\"");
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_validate() {
        assert!(LabelerConfig::default().validate().is_ok());

        let config = LabelerConfig {
            batch_size: 0,
            ..LabelerConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidInput(_))));

        let config = LabelerConfig {
            label_col: " ".to_string(),
            ..LabelerConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidInput(_))));
    }
}
