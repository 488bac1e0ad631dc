//! Interfaces between the application code and the Postgres database.
//!
//! Table and column names come from [`LabelerConfig`] and are quoted into the SQL text;
//! everything a contributor supplies is passed as a bound parameter.

mod consensus;
mod conversions;
mod labels;
mod queries;
mod records;

pub use queries::Queries;

use crate::config::LabelerConfig;
use crate::error::StoreError;
use crate::store::{LabelStore, latest_entries};
use crate::{LabelEntry, LabelingStatus, LeaderboardEntry, Record};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Double, Integer, Nullable, Text, Timestamptz};
use log::{debug, info, warn};

/// Load a `.env` file if there is one, so `DATABASE_URL` can live there.
pub fn load_env() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }
}

pub fn database_url_from_env() -> Option<String> {
    load_env();
    std::env::var("DATABASE_URL").ok()
}

/// Open a new connection.
///
/// # Errors
/// Returns `StoreError::Authentication` for rejected credentials, `StoreError::InvalidInput` for
/// a malformed URL and `StoreError::Connection` otherwise.
pub fn get_database_connection(database_url: &str) -> Result<PgConnection, StoreError> {
    PgConnection::establish(database_url).map_err(connection_error)
}

fn is_auth_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("authentication")
        || message.contains("no password supplied")
        || message.contains("pg_hba.conf")
}

fn connection_error(err: diesel::ConnectionError) -> StoreError {
    match err {
        diesel::ConnectionError::BadConnection(msg) if is_auth_failure(&msg) => {
            StoreError::Authentication(msg)
        }
        diesel::ConnectionError::InvalidConnectionUrl(msg) => StoreError::InvalidInput(msg),
        other => StoreError::Connection(other.to_string()),
    }
}

fn query_error(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
            info,
        ) => StoreError::Connection(info.message().to_string()),
        DieselError::DatabaseError(_, info) if info.message().contains("does not exist") => {
            StoreError::NotFound(info.message().to_string())
        }
        DieselError::BrokenTransactionManager => {
            StoreError::Connection("transaction manager is broken".to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

/// A [`LabelStore`] backed by a Postgres database.
///
/// Holds a single connection. After a connection-level failure the connection is dropped and
/// re-established by the next operation.
pub struct PgStore {
    database_url: String,
    queries: Queries,
    conn: Option<PgConnection>,
}

impl PgStore {
    /// Connect and check that both tables are visible to this account.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if either table is missing, or the connection error.
    pub fn connect(database_url: &str, config: &LabelerConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let conn = get_database_connection(database_url)?;
        let mut store = Self {
            database_url: database_url.to_string(),
            queries: Queries::new(config),
            conn: Some(conn),
        };

        let schema = config.schema();
        let visible = store.run(|conn, _| {
            records::get_visible_tables(
                conn,
                schema.as_deref(),
                &config.dataset_table,
                &config.label_table,
            )
        })?;
        for table in [&config.dataset_table, &config.label_table] {
            if !visible.contains(table) {
                return Err(StoreError::NotFound(format!(
                    "table {table} is not visible from this account"
                )));
            }
        }

        info!(
            "Connected to {} and {}",
            config.qualified_dataset_table(),
            config.qualified_label_table()
        );
        Ok(store)
    }

    fn run<T, F>(&mut self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection, &Queries) -> Result<T, StoreError>,
    {
        if self.conn.is_none() {
            debug!("Re-establishing database connection");
            self.conn = Some(get_database_connection(&self.database_url)?);
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| StoreError::Connection("no database connection".to_string()))?;

        let result = op(conn, &self.queries);
        if let Err(StoreError::Connection(msg)) = &result {
            warn!("Dropping database connection: {msg}");
            self.conn = None;
        }
        result
    }
}

impl LabelStore for PgStore {
    fn candidates(&mut self, contributor: &str, limit: usize) -> Result<Vec<Record>, StoreError> {
        self.run(|conn, queries| records::get_candidates(conn, queries, contributor, limit))
    }

    fn upsert_labels(&mut self, entries: &[LabelEntry]) -> Result<usize, StoreError> {
        let latest = latest_entries(entries)?;
        if latest.is_empty() {
            return Ok(0);
        }
        self.run(|conn, queries| labels::upsert_labels(conn, queries, &latest))
    }

    fn recompute_consensus(&mut self) -> Result<usize, StoreError> {
        self.run(consensus::recompute_consensus)
            .map_err(|err| match err {
                StoreError::AggregationFailure(_) => err,
                other => StoreError::AggregationFailure(other.to_string()),
            })
    }

    fn status(&mut self) -> Result<LabelingStatus, StoreError> {
        self.run(records::get_status)
    }

    fn leaderboard(&mut self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.run(|conn, queries| labels::get_leaderboard(conn, queries, limit))
    }

    fn mark_overlap_pool(&mut self, num_overlap: usize) -> Result<usize, StoreError> {
        self.run(|conn, queries| records::mark_overlap_pool(conn, queries, num_overlap))
    }
}
