//! Database operations for `products`.
//!
//! A product is stored as its full JSONB document plus a few mirrored
//! columns used for filtering. Merging happens in Rust: the bulk upsert locks
//! the affected rows, applies each patch with `ProductDocument::apply`, and
//! writes everything back in one statement.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use wbcache_core::{CardCursor, ProductDocument, ProductUpdate, UpsertSummary};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub nm_id: i64,
    pub supplier_id: Option<i64>,
    pub card_updated_at: Option<DateTime<Utc>>,
    pub needs_enrichment: bool,
    pub document: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Decodes the stored JSONB document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Malformed`] if the document no longer matches
    /// [`ProductDocument`].
    pub fn into_document(self) -> Result<ProductDocument, DbError> {
        let nm_id = self.nm_id;
        serde_json::from_value(self.document).map_err(|e| DbError::Malformed {
            nm_id,
            reason: e.to_string(),
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "nm_id, supplier_id, card_updated_at, needs_enrichment, document, created_at, last_updated_at";

fn decode_all(rows: Vec<ProductRow>) -> Result<Vec<ProductDocument>, DbError> {
    rows.into_iter().map(ProductRow::into_document).collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Applies every update onto its stored document (or a new one) and writes
/// the results back in a single transaction.
///
/// Several updates for the same product are applied in order. `created_at`
/// is written only when the row is inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails (nothing is written), or
/// [`DbError::Malformed`] if a locked row cannot be decoded.
pub async fn bulk_upsert_products(
    pool: &PgPool,
    updates: &[ProductUpdate],
    now: DateTime<Utc>,
) -> Result<UpsertSummary, DbError> {
    if updates.is_empty() {
        return Ok(UpsertSummary::default());
    }

    let mut ids: Vec<i64> = updates.iter().map(|u| u.nm_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut tx = pool.begin().await?;

    // Lock in key order so concurrent upserts over overlapping sets cannot deadlock.
    let existing_rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE nm_id = ANY($1) ORDER BY nm_id FOR UPDATE"
    ))
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    let mut docs: BTreeMap<i64, ProductDocument> = BTreeMap::new();
    for row in existing_rows {
        let nm_id = row.nm_id;
        docs.insert(nm_id, row.into_document()?);
    }
    let existing: HashSet<i64> = docs.keys().copied().collect();

    for update in updates {
        let current = docs.remove(&update.nm_id);
        let merged = ProductDocument::merged(current, update.nm_id, &update.patch, now);
        docs.insert(update.nm_id, merged);
    }

    let mut nm_ids = Vec::with_capacity(docs.len());
    let mut supplier_ids = Vec::with_capacity(docs.len());
    let mut card_updated_ats = Vec::with_capacity(docs.len());
    let mut needs_enrichment = Vec::with_capacity(docs.len());
    let mut documents = Vec::with_capacity(docs.len());
    let mut created_ats = Vec::with_capacity(docs.len());
    let mut last_updated_ats = Vec::with_capacity(docs.len());
    for doc in docs.values() {
        nm_ids.push(doc.nm_id);
        supplier_ids.push(doc.supplier_id);
        card_updated_ats.push(doc.card_updated_at);
        needs_enrichment.push(doc.needs_enrichment());
        documents.push(serde_json::to_value(doc)?);
        created_ats.push(doc.created_at);
        last_updated_ats.push(doc.last_updated_at);
    }

    sqlx::query(
        "INSERT INTO products \
             (nm_id, supplier_id, card_updated_at, needs_enrichment, document, created_at, last_updated_at) \
         SELECT * FROM UNNEST( \
             $1::BIGINT[], $2::BIGINT[], $3::TIMESTAMPTZ[], $4::BOOLEAN[], \
             $5::JSONB[], $6::TIMESTAMPTZ[], $7::TIMESTAMPTZ[]) \
         ON CONFLICT (nm_id) DO UPDATE SET \
             supplier_id = EXCLUDED.supplier_id, \
             card_updated_at = EXCLUDED.card_updated_at, \
             needs_enrichment = EXCLUDED.needs_enrichment, \
             document = EXCLUDED.document, \
             last_updated_at = EXCLUDED.last_updated_at",
    )
    .bind(&nm_ids)
    .bind(&supplier_ids)
    .bind(&card_updated_ats)
    .bind(&needs_enrichment)
    .bind(&documents)
    .bind(&created_ats)
    .bind(&last_updated_ats)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let updated = existing.len();
    let summary = UpsertSummary {
        inserted: docs.len() - updated,
        updated,
    };
    tracing::debug!(
        patches = updates.len(),
        inserted = summary.inserted,
        updated = summary.updated,
        "products upserted"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::Malformed`] on a
/// bad document.
pub async fn find_products_by_supplier(
    pool: &PgPool,
    legacy_id: i64,
) -> Result<Vec<ProductDocument>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE supplier_id = $1 ORDER BY nm_id"
    ))
    .bind(legacy_id)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::Malformed`] on a
/// bad document.
pub async fn find_products_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<ProductDocument>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE nm_id = ANY($1) ORDER BY nm_id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

/// Highest `(card_updated_at, nm_id)` stored for the supplier, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn highest_card_cursor(
    pool: &PgPool,
    legacy_id: i64,
) -> Result<Option<CardCursor>, DbError> {
    let row = sqlx::query_as::<_, (DateTime<Utc>, i64)>(
        "SELECT card_updated_at, nm_id FROM products \
         WHERE supplier_id = $1 AND card_updated_at IS NOT NULL \
         ORDER BY card_updated_at DESC, nm_id DESC \
         LIMIT 1",
    )
    .bind(legacy_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(updated_at, nm_id)| CardCursor { updated_at, nm_id }))
}

/// Documents still missing photos or a vendor code, least recently touched first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure or [`DbError::Malformed`] on a
/// bad document.
pub async fn find_products_missing_enrichment(
    pool: &PgPool,
    limit: usize,
) -> Result<Vec<ProductDocument>, DbError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE needs_enrichment \
         ORDER BY enrichment_attempted_at NULLS FIRST, last_updated_at, nm_id \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

/// Stamps the last CDN probe time for `ids`. The documents are not touched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn mark_enrichment_attempted(
    pool: &PgPool,
    ids: &[i64],
    at: DateTime<Utc>,
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result =
        sqlx::query("UPDATE products SET enrichment_attempted_at = $2 WHERE nm_id = ANY($1)")
            .bind(ids)
            .bind(at)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn count_products_by_supplier(pool: &PgPool, legacy_id: i64) -> Result<u64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE supplier_id = $1")
        .bind(legacy_id)
        .fetch_one(pool)
        .await?;
    Ok(u64::try_from(count).unwrap_or(0))
}
