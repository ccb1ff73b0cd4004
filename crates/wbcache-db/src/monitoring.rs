//! Database operations for `monitored_products`.
//!
//! The monitoring set only grows: ids are added by the card stage and never
//! removed by the worker.

use sqlx::PgPool;

use crate::DbError;

/// Adds ids to the monitoring set, skipping ones already present.
///
/// Returns the number of newly added ids.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn add_monitored_ids(pool: &PgPool, ids: &[i64]) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "INSERT INTO monitored_products (nm_id) \
         SELECT * FROM UNNEST($1::BIGINT[]) \
         ON CONFLICT (nm_id) DO NOTHING",
    )
    .bind(ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_monitored_ids(pool: &PgPool) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT nm_id FROM monitored_products ORDER BY nm_id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}
