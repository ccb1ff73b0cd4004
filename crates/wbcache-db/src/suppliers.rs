//! Database operations for `suppliers`.
//!
//! Supplier rows are created and managed elsewhere. The worker reads the
//! active, valid ones and records the legacy seller id it resolves.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use wbcache_core::Supplier;

use crate::DbError;

/// A row from the `suppliers` table.
#[derive(Clone, sqlx::FromRow)]
pub struct SupplierRow {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub is_active: bool,
    pub is_valid: bool,
    pub legacy_supplier_id: Option<i64>,
    pub legacy_supplier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for SupplierRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplierRow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_key", &"[redacted]")
            .field("is_active", &self.is_active)
            .field("is_valid", &self.is_valid)
            .field("legacy_supplier_id", &self.legacy_supplier_id)
            .finish_non_exhaustive()
    }
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            api_key: row.api_key,
            legacy_supplier_id: row.legacy_supplier_id,
            legacy_supplier_name: row.legacy_supplier_name,
        }
    }
}

const SUPPLIER_COLUMNS: &str = "id, name, api_key, is_active, is_valid, legacy_supplier_id, \
     legacy_supplier_name, created_at, updated_at";

/// Returns all active suppliers whose credentials are marked valid, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_valid_suppliers(pool: &PgPool) -> Result<Vec<SupplierRow>, DbError> {
    let rows = sqlx::query_as::<_, SupplierRow>(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM suppliers \
         WHERE is_active = true AND is_valid = true \
         ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no supplier has `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_supplier(pool: &PgPool, id: i64) -> Result<SupplierRow, DbError> {
    sqlx::query_as::<_, SupplierRow>(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Stores the legacy seller id (and its display name when known).
///
/// An existing name is kept when `legacy_name` is `None`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no supplier has `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_legacy_supplier_id(
    pool: &PgPool,
    id: i64,
    legacy_id: i64,
    legacy_name: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE suppliers \
         SET legacy_supplier_id = $1, \
             legacy_supplier_name = COALESCE($2, legacy_supplier_name), \
             updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(legacy_id)
    .bind(legacy_name)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Marks a supplier's credential valid or invalid.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no supplier has `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_supplier_validity(pool: &PgPool, id: i64, is_valid: bool) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE suppliers SET is_valid = $1, updated_at = NOW() WHERE id = $2")
            .bind(is_valid)
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
