//! Database operations for `public_suppliers`.

use std::collections::BTreeMap;

use sqlx::PgPool;
use wbcache_core::PublicSupplier;

use crate::DbError;

/// Upserts sellers seen on the public site, refreshing their display names.
///
/// Duplicate legacy ids in one call collapse to the last name seen, since a
/// single statement cannot touch the same row twice. Empty names are skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_public_suppliers(
    pool: &PgPool,
    suppliers: &[PublicSupplier],
) -> Result<u64, DbError> {
    let deduped: BTreeMap<i64, &str> = suppliers
        .iter()
        .filter(|s| !s.name.trim().is_empty())
        .map(|s| (s.legacy_id, s.name.as_str()))
        .collect();
    if deduped.is_empty() {
        return Ok(0);
    }

    let ids: Vec<i64> = deduped.keys().copied().collect();
    let names: Vec<&str> = deduped.values().copied().collect();

    let result = sqlx::query(
        "INSERT INTO public_suppliers (legacy_id, name) \
         SELECT * FROM UNNEST($1::BIGINT[], $2::TEXT[]) \
         ON CONFLICT (legacy_id) DO UPDATE SET \
             name = EXCLUDED.name, \
             updated_at = NOW() \
         WHERE public_suppliers.name IS DISTINCT FROM EXCLUDED.name",
    )
    .bind(&ids)
    .bind(&names)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
