//! Reads and flag updates on the dataset table.

use super::*;

#[derive(Debug, QueryableByName)]
struct RecordPrivate {
    #[diesel(sql_type = Text)]
    id: String,
    #[diesel(sql_type = Text)]
    body: String,
    #[diesel(sql_type = Integer)]
    subset: i32,
    #[diesel(sql_type = Integer)]
    num_manual_labels: i32,
    #[diesel(sql_type = Nullable<Double>)]
    manual_label: Option<f64>,
}

#[derive(Debug, QueryableByName)]
struct StatusPrivate {
    #[diesel(sql_type = BigInt)]
    num_labeled: i64,
    #[diesel(sql_type = BigInt)]
    num_samples: i64,
}

#[derive(Debug, QueryableByName)]
struct TableNamePrivate {
    #[diesel(sql_type = Text)]
    table_name: String,
}

fn private_to_public(p: RecordPrivate) -> Result<Record, String> {
    use conversions::*;
    Ok(Record {
        id: p.id,
        body: p.body,
        in_overlap: i32_to_flag(p.subset),
        num_manual_labels: i32_to_u32(p.num_manual_labels)?,
        manual_label: p.manual_label,
    })
}

/// Names of the given tables that this account can see in `schema`.
pub fn get_visible_tables(
    conn: &mut PgConnection,
    schema: Option<&str>,
    dataset_table: &str,
    label_table: &str,
) -> Result<Vec<String>, StoreError> {
    let rows: Vec<TableNamePrivate> = sql_query(Queries::visible_tables())
        .bind::<Nullable<Text>, _>(schema)
        .bind::<Text, _>(dataset_table)
        .bind::<Text, _>(label_table)
        .load(conn)
        .map_err(query_error)?;
    Ok(rows.into_iter().map(|row| row.table_name).collect())
}

pub fn get_candidates(
    conn: &mut PgConnection,
    queries: &Queries,
    contributor: &str,
    limit: usize,
) -> Result<Vec<Record>, StoreError> {
    let limit = conversions::usize_to_i64_limit(limit);

    let items_private: Vec<RecordPrivate> = sql_query(queries.batch())
        .bind::<Text, _>(contributor)
        .bind::<BigInt, _>(limit)
        .load(conn)
        .map_err(query_error)?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<Record>, String>>()
        .map_err(conversions::into_store_error)
}

pub fn get_status(
    conn: &mut PgConnection,
    queries: &Queries,
) -> Result<LabelingStatus, StoreError> {
    use conversions::*;

    let status: StatusPrivate = sql_query(queries.status())
        .get_result(conn)
        .map_err(query_error)?;

    Ok(LabelingStatus {
        num_labeled: i64_to_u64(status.num_labeled).map_err(into_store_error)?,
        num_samples: i64_to_u64(status.num_samples).map_err(into_store_error)?,
    })
}

/// Flag the first `num_overlap` records by id as the overlap pool, in one transaction.
pub fn mark_overlap_pool(
    conn: &mut PgConnection,
    queries: &Queries,
    num_overlap: usize,
) -> Result<usize, StoreError> {
    let limit = conversions::usize_to_i64_limit(num_overlap);

    conn.transaction::<usize, DieselError, _>(|conn| {
        let cleared = sql_query(queries.clear_overlap()).execute(conn)?;
        debug!("Cleared the overlap flag on {cleared} records");
        sql_query(queries.mark_overlap())
            .bind::<BigInt, _>(limit)
            .execute(conn)
    })
    .map_err(query_error)
}
