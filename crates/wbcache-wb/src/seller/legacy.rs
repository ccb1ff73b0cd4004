//! Resolving a key to the legacy numeric seller id used by the public site.
//!
//! The seller APIs never return that id, so it is read off one of the seller's
//! own products on the public card API.

use serde::Serialize;

use crate::error::WbError;
use crate::site::fetch_detail;
use crate::trace::RequestTrace;

use super::SellerClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySupplierInfo {
    pub supplier_id: i64,
    pub supplier_name: Option<String>,
}

impl SellerClient {
    /// # Errors
    ///
    /// - [`WbError::NoData`] if the key has no priced goods, or the public
    ///   site does not know the sampled product or its seller.
    /// - Any request error from either step.
    pub async fn get_supplier_legacy_info(
        &self,
    ) -> Result<(LegacySupplierInfo, RequestTrace), WbError> {
        let mut trace = RequestTrace::new("legacy supplier info");

        let goods = self.fetch_price_page(0, 1, &mut trace).await?;
        let Some(sample) = goods.first() else {
            return Err(WbError::NoData(
                "price list is empty; cannot sample a product".to_owned(),
            ));
        };
        let nm_id = sample.nm_id;

        let products = fetch_detail(&self.http, &[nm_id], &mut trace).await?;
        let Some(product) = products.into_iter().find(|p| p.nm_id == nm_id) else {
            return Err(WbError::NoData(format!(
                "public site returned no product for nmId {nm_id}"
            )));
        };
        let Some(supplier_id) = product.supplier_id else {
            return Err(WbError::NoData(format!(
                "public product {nm_id} carries no supplierId"
            )));
        };

        Ok((
            LegacySupplierInfo {
                supplier_id,
                supplier_name: product.supplier_name,
            },
            trace,
        ))
    }
}
