//! Recompute record consensus inside the database.

use super::*;

/// Clear every aggregate, then write the count and mean of each record's label rows.
/// Both statements share one transaction, so readers never see the cleared state and a failure
/// leaves the previous aggregates untouched. Returns how many records received a consensus.
pub fn recompute_consensus(
    conn: &mut PgConnection,
    queries: &Queries,
) -> Result<usize, StoreError> {
    conn.transaction::<usize, DieselError, _>(|conn| {
        sql_query(queries.clear_consensus()).execute(conn)?;
        sql_query(queries.write_consensus()).execute(conn)
    })
    .map_err(query_error)
}
