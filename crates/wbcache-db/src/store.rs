//! [`PgStore`]: the Postgres implementation of the store traits the
//! aggregation pipeline runs against.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use wbcache_core::{
    CardCursor, MonitoringSet, PriceHistoryEntry, PriceHistoryStore, ProductDocument,
    ProductStore, ProductUpdate, PublicSupplier, PublicSupplierDirectory, StoreError, Supplier,
    SupplierDirectory, UpsertSummary,
};

use crate::{
    add_monitored_ids, bulk_upsert_products, count_products_by_supplier, find_products_by_ids,
    find_products_by_supplier, find_products_missing_enrichment, highest_card_cursor,
    insert_price_history, latest_price_history, list_active_valid_suppliers, list_monitored_ids,
    list_price_history, mark_enrichment_attempted, set_legacy_supplier_id,
    upsert_public_suppliers,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SupplierDirectory for PgStore {
    async fn list_active_valid(&self) -> Result<Vec<Supplier>, StoreError> {
        let rows = list_active_valid_suppliers(&self.pool).await?;
        Ok(rows.into_iter().map(Supplier::from).collect())
    }

    async fn persist_resolved_legacy_id(
        &self,
        supplier_id: i64,
        legacy_id: i64,
        legacy_name: Option<&str>,
    ) -> Result<(), StoreError> {
        set_legacy_supplier_id(&self.pool, supplier_id, legacy_id, legacy_name).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn bulk_upsert(&self, updates: Vec<ProductUpdate>) -> Result<UpsertSummary, StoreError> {
        Ok(bulk_upsert_products(&self.pool, &updates, Utc::now()).await?)
    }

    async fn find_by_supplier(&self, legacy_id: i64) -> Result<Vec<ProductDocument>, StoreError> {
        Ok(find_products_by_supplier(&self.pool, legacy_id).await?)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ProductDocument>, StoreError> {
        Ok(find_products_by_ids(&self.pool, ids).await?)
    }

    async fn highest_card_cursor(&self, legacy_id: i64) -> Result<Option<CardCursor>, StoreError> {
        Ok(highest_card_cursor(&self.pool, legacy_id).await?)
    }

    async fn find_missing_enrichment(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductDocument>, StoreError> {
        Ok(find_products_missing_enrichment(&self.pool, limit).await?)
    }

    async fn mark_enrichment_attempted(&self, ids: &[i64]) -> Result<(), StoreError> {
        mark_enrichment_attempted(&self.pool, ids, Utc::now()).await?;
        Ok(())
    }

    async fn count_by_supplier(&self, legacy_id: i64) -> Result<u64, StoreError> {
        Ok(count_products_by_supplier(&self.pool, legacy_id).await?)
    }
}

#[async_trait]
impl MonitoringSet for PgStore {
    async fn add_ids(&self, ids: &[i64]) -> Result<u64, StoreError> {
        Ok(add_monitored_ids(&self.pool, ids).await?)
    }

    async fn all_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(list_monitored_ids(&self.pool).await?)
    }
}

#[async_trait]
impl PriceHistoryStore for PgStore {
    async fn append(&self, entries: Vec<PriceHistoryEntry>) -> Result<(), StoreError> {
        insert_price_history(&self.pool, &entries).await?;
        Ok(())
    }

    async fn latest_for(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, PriceHistoryEntry>, StoreError> {
        Ok(latest_price_history(&self.pool, ids).await?)
    }

    async fn list_for(
        &self,
        nm_id: i64,
        limit: usize,
    ) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        Ok(list_price_history(&self.pool, nm_id, limit).await?)
    }
}

#[async_trait]
impl PublicSupplierDirectory for PgStore {
    async fn upsert(&self, suppliers: Vec<PublicSupplier>) -> Result<(), StoreError> {
        upsert_public_suppliers(&self.pool, &suppliers).await?;
        Ok(())
    }
}
