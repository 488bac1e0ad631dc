//! SQL text for every statement the store runs.

use super::*;

/// Statements rendered for one dataset/label table pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queries {
    dataset: String,
    labels: String,
    label_col: String,
}

impl Queries {
    pub fn new(config: &LabelerConfig) -> Self {
        Self {
            dataset: config.qualified_dataset_table(),
            labels: config.qualified_label_table(),
            label_col: config.quoted_label_col(),
        }
    }

    /// Binds: `$1` schema (nullable), `$2` dataset table, `$3` label table.
    pub fn visible_tables() -> &'static str {
        "SELECT table_name::text AS table_name
        FROM information_schema.tables
        WHERE table_schema = COALESCE($1, current_schema())
        AND table_name IN ($2, $3);"
    }

    /// Overlap records first, then everything without a consensus, random within each group.
    /// Binds: `$1` contributor, `$2` limit.
    pub fn batch(&self) -> String {
        let Self {
            dataset,
            labels,
            label_col,
        } = self;
        format!(
            "SELECT DS.id::text AS id,
                COALESCE(DS.body, '')::text AS body,
                COALESCE(DS.subset, 0)::integer AS subset,
                COALESCE(DS.num_manual_labels, 0)::integer AS num_manual_labels,
                DS.{label_col}::float8 AS manual_label
            FROM {dataset} AS DS
            LEFT JOIN (SELECT DISTINCT id
                       FROM {labels}
                       WHERE contributor = $1) AS UL
            ON DS.id = UL.id
            WHERE DS.{label_col} IS NULL
            OR (COALESCE(DS.subset, 0) = 1 AND UL.id IS NULL)
            ORDER BY COALESCE(DS.subset, 0) DESC, RANDOM()
            LIMIT $2;"
        )
    }

    /// Binds: `$1` record ids, `$2` contributors.
    pub fn delete_labels(&self) -> String {
        let labels = &self.labels;
        format!(
            "DELETE FROM {labels} AS L
            USING UNNEST($1::text[], $2::text[]) AS U(id, contributor)
            WHERE L.id = U.id AND L.contributor = U.contributor;"
        )
    }

    /// Binds: `$1` record ids, `$2` contributors, `$3` label scores, `$4` timestamps.
    pub fn insert_labels(&self) -> String {
        let Self {
            labels, label_col, ..
        } = self;
        format!(
            "INSERT INTO {labels} (id, contributor, {label_col}, \"timestamp\")
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::float8[], $4::timestamptz[]);"
        )
    }

    pub fn clear_consensus(&self) -> String {
        let Self {
            dataset, label_col, ..
        } = self;
        format!("UPDATE {dataset} SET num_manual_labels = 0, {label_col} = NULL;")
    }

    pub fn write_consensus(&self) -> String {
        let Self {
            dataset,
            labels,
            label_col,
        } = self;
        format!(
            "UPDATE {dataset} AS DS
            SET num_manual_labels = AGG.num_manual_labels, {label_col} = AGG.manual_label
            FROM (SELECT id,
                         COUNT({label_col}) AS num_manual_labels,
                         AVG({label_col}) AS manual_label
                  FROM {labels}
                  GROUP BY id) AS AGG
            WHERE DS.id = AGG.id;"
        )
    }

    pub fn status(&self) -> String {
        let Self {
            dataset, label_col, ..
        } = self;
        format!(
            "SELECT COUNT({label_col})::bigint AS num_labeled,
                COUNT(1)::bigint AS num_samples
            FROM {dataset};"
        )
    }

    /// Binds: `$1` limit.
    pub fn leaderboard(&self) -> String {
        let labels = &self.labels;
        format!(
            "SELECT contributor::text AS contributor,
                COUNT(1)::bigint AS num_labels
            FROM {labels}
            GROUP BY contributor
            ORDER BY num_labels DESC, contributor ASC
            LIMIT $1;"
        )
    }

    pub fn clear_overlap(&self) -> String {
        let dataset = &self.dataset;
        format!("UPDATE {dataset} SET subset = 0 WHERE subset IS DISTINCT FROM 0;")
    }

    /// Binds: `$1` number of records to flag.
    pub fn mark_overlap(&self) -> String {
        let dataset = &self.dataset;
        format!(
            "UPDATE {dataset} SET subset = 1
            WHERE id IN (SELECT id FROM {dataset} ORDER BY id ASC LIMIT $1);"
        )
    }
}
