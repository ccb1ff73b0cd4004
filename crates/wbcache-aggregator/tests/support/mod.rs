//! In-memory store double shared by the pipeline tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use wbcache_core::{
    CardCursor, MonitoringSet, PriceHistoryEntry, PriceHistoryStore, ProductDocument,
    ProductStore, ProductUpdate, PublicSupplier, PublicSupplierDirectory, StoreError, Supplier,
    SupplierDirectory, UpsertSummary,
};

#[derive(Default)]
pub struct State {
    pub suppliers: Vec<Supplier>,
    pub products: BTreeMap<i64, ProductDocument>,
    pub monitoring: BTreeSet<i64>,
    pub history: Vec<PriceHistoryEntry>,
    pub public_suppliers: BTreeMap<i64, String>,
    pub upsert_calls: usize,
    /// Probe order: product id to the sequence number of its last attempt.
    pub enrichment_attempts: BTreeMap<i64, u64>,
    attempt_seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_suppliers(suppliers: Vec<Supplier>) -> Self {
        Self {
            state: Mutex::new(State {
                suppliers,
                ..State::default()
            }),
        }
    }

    pub fn insert_product(&self, doc: ProductDocument) {
        self.state.lock().unwrap().products.insert(doc.nm_id, doc);
    }

    pub fn product(&self, nm_id: i64) -> Option<ProductDocument> {
        self.state.lock().unwrap().products.get(&nm_id).cloned()
    }
}

pub fn supplier(id: i64, api_key: &str, legacy: Option<i64>) -> Supplier {
    Supplier {
        id,
        name: format!("supplier {id}"),
        api_key: api_key.to_string(),
        legacy_supplier_id: legacy,
        legacy_supplier_name: None,
    }
}

#[async_trait]
impl SupplierDirectory for MemoryStore {
    async fn list_active_valid(&self) -> Result<Vec<Supplier>, StoreError> {
        Ok(self.state.lock().unwrap().suppliers.clone())
    }

    async fn persist_resolved_legacy_id(
        &self,
        supplier_id: i64,
        legacy_id: i64,
        legacy_name: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let supplier = state
            .suppliers
            .iter_mut()
            .find(|s| s.id == supplier_id)
            .ok_or_else(|| StoreError::Backend("unknown supplier".into()))?;
        supplier.legacy_supplier_id = Some(legacy_id);
        if let Some(name) = legacy_name {
            supplier.legacy_supplier_name = Some(name.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn bulk_upsert(&self, updates: Vec<ProductUpdate>) -> Result<UpsertSummary, StoreError> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;
        let mut summary = UpsertSummary::default();
        let mut seen = BTreeSet::new();
        for update in updates {
            let existing = state.products.remove(&update.nm_id);
            if seen.insert(update.nm_id) {
                if existing.is_some() {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
            let merged = ProductDocument::merged(existing, update.nm_id, &update.patch, now);
            state.products.insert(update.nm_id, merged);
        }
        Ok(summary)
    }

    async fn find_by_supplier(&self, legacy_id: i64) -> Result<Vec<ProductDocument>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .values()
            .filter(|d| d.supplier_id == Some(legacy_id))
            .cloned()
            .collect())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ProductDocument>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn highest_card_cursor(&self, legacy_id: i64) -> Result<Option<CardCursor>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .values()
            .filter(|d| d.supplier_id == Some(legacy_id))
            .filter_map(|d| d.card_updated_at.map(|at| (at, d.nm_id)))
            .max()
            .map(|(updated_at, nm_id)| CardCursor { updated_at, nm_id }))
    }

    async fn find_missing_enrichment(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductDocument>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut docs: Vec<ProductDocument> = state
            .products
            .values()
            .filter(|d| d.needs_enrichment())
            .cloned()
            .collect();
        docs.sort_by_key(|d| {
            (
                state.enrichment_attempts.get(&d.nm_id).copied(),
                d.last_updated_at,
                d.nm_id,
            )
        });
        docs.truncate(limit);
        Ok(docs)
    }

    async fn mark_enrichment_attempted(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        for &nm_id in ids {
            state.attempt_seq += 1;
            let seq = state.attempt_seq;
            state.enrichment_attempts.insert(nm_id, seq);
        }
        Ok(())
    }

    async fn count_by_supplier(&self, legacy_id: i64) -> Result<u64, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .values()
            .filter(|d| d.supplier_id == Some(legacy_id))
            .count() as u64)
    }
}

#[async_trait]
impl MonitoringSet for MemoryStore {
    async fn add_ids(&self, ids: &[i64]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        Ok(ids.iter().filter(|id| state.monitoring.insert(**id)).count() as u64)
    }

    async fn all_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(self.state.lock().unwrap().monitoring.iter().copied().collect())
    }
}

#[async_trait]
impl PriceHistoryStore for MemoryStore {
    async fn append(&self, entries: Vec<PriceHistoryEntry>) -> Result<(), StoreError> {
        self.state.lock().unwrap().history.extend(entries);
        Ok(())
    }

    async fn latest_for(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, PriceHistoryEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut latest = HashMap::new();
        for entry in &state.history {
            if ids.contains(&entry.nm_id) {
                latest.insert(entry.nm_id, entry.clone());
            }
        }
        Ok(latest)
    }

    async fn list_for(
        &self,
        nm_id: i64,
        limit: usize,
    ) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|e| e.nm_id == nm_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PublicSupplierDirectory for MemoryStore {
    async fn upsert(&self, suppliers: Vec<PublicSupplier>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        for s in suppliers {
            state.public_suppliers.insert(s.legacy_id, s.name);
        }
        Ok(())
    }
}
