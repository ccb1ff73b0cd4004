//! Persistence contracts consumed by the aggregation pipeline.
//!
//! `wbcache-db` implements these on Postgres; tests use in-memory doubles.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::history::PriceHistoryEntry;
use crate::patch::ProductUpdate;
use crate::product::{CardCursor, ProductDocument};
use crate::supplier::{PublicSupplier, Supplier};

/// Failure reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("stored document for product {nm_id} is malformed: {reason}")]
    Malformed { nm_id: i64, reason: String },
}

/// Counts returned by [`ProductStore::bulk_upsert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    /// Suppliers whose credentials passed validation and are enabled.
    async fn list_active_valid(&self) -> Result<Vec<Supplier>, StoreError>;

    async fn persist_resolved_legacy_id(
        &self,
        supplier_id: i64,
        legacy_id: i64,
        legacy_name: Option<&str>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Applies each patch onto the stored document, creating it when absent.
    ///
    /// `created_at` is only set on insert. Fields a patch does not carry are
    /// left as stored.
    async fn bulk_upsert(&self, updates: Vec<ProductUpdate>) -> Result<UpsertSummary, StoreError>;

    async fn find_by_supplier(&self, legacy_id: i64) -> Result<Vec<ProductDocument>, StoreError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ProductDocument>, StoreError>;

    /// Highest `(card_updated_at, nm_id)` stored for the supplier.
    async fn highest_card_cursor(&self, legacy_id: i64) -> Result<Option<CardCursor>, StoreError>;

    /// Documents missing photos or a vendor code, least recently probed first.
    async fn find_missing_enrichment(&self, limit: usize)
        -> Result<Vec<ProductDocument>, StoreError>;

    /// Moves `ids` to the back of the enrichment queue without touching
    /// their documents.
    async fn mark_enrichment_attempted(&self, ids: &[i64]) -> Result<(), StoreError>;

    async fn count_by_supplier(&self, legacy_id: i64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait MonitoringSet: Send + Sync {
    /// Adds ids, ignoring ones already present. Returns how many were new.
    async fn add_ids(&self, ids: &[i64]) -> Result<u64, StoreError>;

    async fn all_ids(&self) -> Result<Vec<i64>, StoreError>;
}

#[async_trait]
pub trait PriceHistoryStore: Send + Sync {
    async fn append(&self, entries: Vec<PriceHistoryEntry>) -> Result<(), StoreError>;

    /// Most recent entry per product, for change detection.
    async fn latest_for(&self, ids: &[i64]) -> Result<HashMap<i64, PriceHistoryEntry>, StoreError>;

    /// Entries for one product, newest first.
    async fn list_for(&self, nm_id: i64, limit: usize)
        -> Result<Vec<PriceHistoryEntry>, StoreError>;
}

#[async_trait]
pub trait PublicSupplierDirectory: Send + Sync {
    async fn upsert(&self, suppliers: Vec<PublicSupplier>) -> Result<(), StoreError>;
}
