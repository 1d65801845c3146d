use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::imaging::PreparedImage;
use crate::models::Embedding;

/// Maps images and text into the same normalized embedding space.
///
/// Implementations return unit-length vectors of [`crate::models::EMBEDDING_DIM`] floats.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a free-text query
    async fn embed_text(&self, text: &str) -> CatalogResult<Embedding>;

    /// Embed a preprocessed image
    async fn embed_image(&self, image: &PreparedImage) -> CatalogResult<Embedding>;
}
