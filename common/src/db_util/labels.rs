//! Writes and reads on the label table.

use super::*;

#[derive(Debug, QueryableByName)]
struct LeaderboardPrivate {
    #[diesel(sql_type = Text)]
    contributor: String,
    #[diesel(sql_type = BigInt)]
    num_labels: i64,
}

fn private_to_public(p: LeaderboardPrivate) -> Result<LeaderboardEntry, String> {
    use conversions::*;
    Ok(LeaderboardEntry {
        contributor: p.contributor,
        num_labels: i64_to_u64(p.num_labels)?,
    })
}

/// Column-wise arrays for an `UNNEST` insert.
struct LabelColumns {
    ids: Vec<String>,
    contributors: Vec<String>,
    scores: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
}

fn build_columns(entries: &[&LabelEntry]) -> Result<LabelColumns, String> {
    let mut columns = LabelColumns {
        ids: Vec::with_capacity(entries.len()),
        contributors: Vec::with_capacity(entries.len()),
        scores: Vec::with_capacity(entries.len()),
        timestamps: Vec::with_capacity(entries.len()),
    };
    for entry in entries {
        columns.scores.push(conversions::label_to_score(entry)?);
        columns.ids.push(entry.record_id.clone());
        columns.contributors.push(entry.contributor.clone());
        columns.timestamps.push(entry.timestamp);
    }
    Ok(columns)
}

/// Replace the label rows of every (record, contributor) in `entries`, all in one transaction.
/// `entries` must already be free of duplicate keys.
pub fn upsert_labels(
    conn: &mut PgConnection,
    queries: &Queries,
    entries: &[&LabelEntry],
) -> Result<usize, StoreError> {
    let LabelColumns {
        ids,
        contributors,
        scores,
        timestamps,
    } = build_columns(entries).map_err(conversions::into_store_error)?;

    conn.transaction::<usize, DieselError, _>(|conn| {
        let replaced = sql_query(queries.delete_labels())
            .bind::<Array<Text>, _>(&ids)
            .bind::<Array<Text>, _>(&contributors)
            .execute(conn)?;
        let inserted = sql_query(queries.insert_labels())
            .bind::<Array<Text>, _>(&ids)
            .bind::<Array<Text>, _>(&contributors)
            .bind::<Array<Double>, _>(&scores)
            .bind::<Array<Timestamptz>, _>(&timestamps)
            .execute(conn)?;
        debug!("Inserted {inserted} label rows, replacing {replaced}");
        Ok(inserted)
    })
    .map_err(query_error)
}

pub fn get_leaderboard(
    conn: &mut PgConnection,
    queries: &Queries,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let limit = conversions::usize_to_i64_limit(limit);

    let items_private: Vec<LeaderboardPrivate> = sql_query(queries.leaderboard())
        .bind::<BigInt, _>(limit)
        .load(conn)
        .map_err(query_error)?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<LeaderboardEntry>, String>>()
        .map_err(conversions::into_store_error)
}
