use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::filter::FilterPredicate;
use crate::models::{Embedding, RankedHit};

/// Approximate nearest-neighbour index over product embeddings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `top_k` hits matching `filter`, best score first
    async fn query(
        &self,
        vector: &Embedding,
        top_k: u32,
        filter: &FilterPredicate,
    ) -> CatalogResult<Vec<RankedHit>>;
}
