//! Supplier credential records and per-run grouping by marketplace account.
//!
//! Several stored credentials may point at the same marketplace seller. The
//! pipeline talks to each seller once per run, through one representative
//! credential per legacy seller id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored supplier credential, owned by the supplier-management side.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub legacy_supplier_id: Option<i64>,
    pub legacy_supplier_name: Option<String>,
}

impl std::fmt::Debug for Supplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supplier")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_key", &"[redacted]")
            .field("legacy_supplier_id", &self.legacy_supplier_id)
            .field("legacy_supplier_name", &self.legacy_supplier_name)
            .finish()
    }
}

/// A supplier whose legacy id is known for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSupplier {
    pub supplier: Supplier,
    pub legacy_id: i64,
}

/// All credentials sharing one marketplace account.
#[derive(Clone, PartialEq, Eq)]
pub struct SupplierGroup {
    pub legacy_id: i64,
    /// Supplier record whose key is used for API traffic.
    pub representative_id: i64,
    pub api_key: String,
    pub member_ids: Vec<i64>,
}

impl std::fmt::Debug for SupplierGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplierGroup")
            .field("legacy_id", &self.legacy_id)
            .field("representative_id", &self.representative_id)
            .field("api_key", &"[redacted]")
            .field("member_ids", &self.member_ids)
            .finish()
    }
}

/// A public seller observed on the site: legacy id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSupplier {
    pub legacy_id: i64,
    pub name: String,
}

/// Splits suppliers into those with a known legacy id and those that still
/// need resolution.
#[must_use]
pub fn partition_unresolved(suppliers: Vec<Supplier>) -> (Vec<ResolvedSupplier>, Vec<Supplier>) {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for supplier in suppliers {
        match supplier.legacy_supplier_id {
            Some(legacy_id) => resolved.push(ResolvedSupplier {
                supplier,
                legacy_id,
            }),
            None => unresolved.push(supplier),
        }
    }
    (resolved, unresolved)
}

/// Groups resolved suppliers by legacy id.
///
/// The representative is the supplier with the lowest record id, so the
/// choice is stable across runs.
#[must_use]
pub fn group_by_legacy_id(resolved: &[ResolvedSupplier]) -> BTreeMap<i64, SupplierGroup> {
    let mut groups: BTreeMap<i64, SupplierGroup> = BTreeMap::new();
    for r in resolved {
        groups
            .entry(r.legacy_id)
            .and_modify(|g| {
                g.member_ids.push(r.supplier.id);
                if r.supplier.id < g.representative_id {
                    g.representative_id = r.supplier.id;
                    g.api_key.clone_from(&r.supplier.api_key);
                }
            })
            .or_insert_with(|| SupplierGroup {
                legacy_id: r.legacy_id,
                representative_id: r.supplier.id,
                api_key: r.supplier.api_key.clone(),
                member_ids: vec![r.supplier.id],
            });
    }
    for group in groups.values_mut() {
        group.member_ids.sort_unstable();
    }
    groups
}
