use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::models::ProductRecord;

/// Bulk product lookups against the relational catalog.
///
/// Both methods issue one batched request. Ids that do not exist are simply absent
/// from the returned map.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Columns needed to render search results
    async fn fetch_by_ids(&self, ids: &[String]) -> CatalogResult<HashMap<String, ProductRecord>>;

    /// Columns needed to describe products to the stylist (adds material, season, description)
    async fn fetch_products_by_ids(
        &self,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, ProductRecord>>;
}
