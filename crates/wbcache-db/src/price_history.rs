//! Database operations for the append-only `price_history` ledger.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use wbcache_core::{HistoryTrigger, PriceHistoryEntry};

use crate::DbError;

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub nm_id: i64,
    pub created_at: DateTime<Utc>,
    pub api_price: Option<f64>,
    pub api_discount: Option<f64>,
    pub site_price: Option<f64>,
    pub spp: Option<f64>,
    pub trigger: String,
}

impl TryFrom<PriceHistoryRow> for PriceHistoryEntry {
    type Error = DbError;

    fn try_from(row: PriceHistoryRow) -> Result<Self, Self::Error> {
        let trigger = row
            .trigger
            .parse::<HistoryTrigger>()
            .map_err(|reason| DbError::InvalidRow {
                table: "price_history",
                reason,
            })?;
        Ok(PriceHistoryEntry {
            nm_id: row.nm_id,
            created_at: row.created_at,
            api_price: row.api_price,
            api_discount: row.api_discount,
            site_price: row.site_price,
            spp: row.spp,
            trigger,
        })
    }
}

const HISTORY_COLUMNS: &str =
    "id, nm_id, created_at, api_price, api_discount, site_price, spp, trigger";

/// Appends entries to the ledger in one statement.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_price_history(
    pool: &PgPool,
    entries: &[PriceHistoryEntry],
) -> Result<u64, DbError> {
    if entries.is_empty() {
        return Ok(0);
    }

    let nm_ids: Vec<i64> = entries.iter().map(|e| e.nm_id).collect();
    let created_ats: Vec<DateTime<Utc>> = entries.iter().map(|e| e.created_at).collect();
    let api_prices: Vec<Option<f64>> = entries.iter().map(|e| e.api_price).collect();
    let api_discounts: Vec<Option<f64>> = entries.iter().map(|e| e.api_discount).collect();
    let site_prices: Vec<Option<f64>> = entries.iter().map(|e| e.site_price).collect();
    let spps: Vec<Option<f64>> = entries.iter().map(|e| e.spp).collect();
    let triggers: Vec<&str> = entries.iter().map(|e| e.trigger.as_str()).collect();

    let result = sqlx::query(
        "INSERT INTO price_history \
             (nm_id, created_at, api_price, api_discount, site_price, spp, trigger) \
         SELECT * FROM UNNEST( \
             $1::BIGINT[], $2::TIMESTAMPTZ[], $3::DOUBLE PRECISION[], $4::DOUBLE PRECISION[], \
             $5::DOUBLE PRECISION[], $6::DOUBLE PRECISION[], $7::TEXT[])",
    )
    .bind(&nm_ids)
    .bind(&created_ats)
    .bind(&api_prices)
    .bind(&api_discounts)
    .bind(&site_prices)
    .bind(&spps)
    .bind(&triggers)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// The most recent entry for each of `ids` that has any history.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::InvalidRow`] on
/// an unknown trigger value.
pub async fn latest_price_history(
    pool: &PgPool,
    ids: &[i64],
) -> Result<HashMap<i64, PriceHistoryEntry>, DbError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, PriceHistoryRow>(&format!(
        "SELECT DISTINCT ON (nm_id) {HISTORY_COLUMNS} FROM price_history \
         WHERE nm_id = ANY($1) \
         ORDER BY nm_id, created_at DESC, id DESC"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let entry = PriceHistoryEntry::try_from(row)?;
            Ok((entry.nm_id, entry))
        })
        .collect()
}

/// Entries for one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::InvalidRow`] on
/// an unknown trigger value.
pub async fn list_price_history(
    pool: &PgPool,
    nm_id: i64,
    limit: usize,
) -> Result<Vec<PriceHistoryEntry>, DbError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query_as::<_, PriceHistoryRow>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM price_history \
         WHERE nm_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(nm_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PriceHistoryEntry::try_from).collect()
}
