use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Span, instrument};

use crate::cache::{SearchCache, read_json, write_json};
use crate::cache_key;
use crate::embedding::EmbeddingService;
use crate::error::{CatalogError, CatalogResult};
use crate::filter::FilterPredicate;
use crate::fusion::fuse;
use crate::imaging::{ImageCodec, prepare_image};
use crate::index::VectorIndex;
use crate::merger::merge;
use crate::models::{Embedding, MAX_SEARCH_LIMIT, Query, QueryType, SearchRequest, SearchResponse};
use crate::settings::CatalogSettings;
use crate::store::ProductStore;

/// Multimodal product search.
///
/// classify -> cache lookup -> embed -> filter -> vector query -> bulk lookup -> merge -> cache store
pub struct SearchService {
    embedder: Arc<dyn EmbeddingService>,
    codec: Arc<dyn ImageCodec>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn SearchCache>,
    settings: CatalogSettings,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        codec: Arc<dyn ImageCodec>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn SearchCache>,
    ) -> Self {
        Self {
            embedder,
            codec,
            index,
            store,
            cache,
            settings: CatalogSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CatalogSettings) -> Self {
        self.settings = settings;
        self
    }

    #[instrument(skip(self, request), fields(query_type, cache_key, results))]
    pub async fn search(&self, request: SearchRequest) -> CatalogResult<SearchResponse> {
        if request.limit == 0 || request.limit > MAX_SEARCH_LIMIT {
            return Err(CatalogError::InvalidLimit {
                max: MAX_SEARCH_LIMIT,
                actual: request.limit,
            });
        }

        let text = request.query.as_deref();
        let image = request.image.as_deref();
        let query_type = QueryType::classify(text, image)?;
        Span::current().record("query_type", query_type.as_str());

        let key = cache_key::search_key(query_type, text, image, &request.filters, request.limit);
        Span::current().record("cache_key", key.as_str());

        if let Some(cached) = read_json::<SearchResponse>(self.cache.as_ref(), &key).await {
            tracing::info!("search cache hit");
            return Ok(cached);
        }

        let query = Query::decode(query_type, text, image)?;
        let vector = self.embed(query).await?;
        let predicate = FilterPredicate::build(&request.filters);

        let hits = self.index.query(&vector, request.limit, &predicate).await?;
        let results = if hits.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<String> = hits.iter().map(|hit| hit.product_id.clone()).collect();
            let records = self.store.fetch_by_ids(&ids).await?;
            merge(&hits, &records)
        };

        let response = SearchResponse::new(results, query_type);
        Span::current().record("results", response.total);

        write_json(self.cache.as_ref(), &key, &response, self.settings.search_cache_ttl).await;
        tracing::info!("search complete");

        Ok(response)
    }

    async fn embed(&self, query: Query) -> CatalogResult<Embedding> {
        match query {
            Query::Text(text) => self.embedder.embed_text(&text).await,
            Query::Image(bytes) => {
                let prepared = prepare_image(self.codec.clone(), bytes).await?;
                self.embedder.embed_image(&prepared).await
            }
            Query::Hybrid { image, text } => {
                // An undecodable image fails the request before either embedding call
                let prepared = prepare_image(self.codec.clone(), image).await?;

                let image_task = {
                    let embedder = self.embedder.clone();
                    tokio::spawn(async move { embedder.embed_image(&prepared).await })
                };
                let text_task = {
                    let embedder = self.embedder.clone();
                    tokio::spawn(async move { embedder.embed_text(&text).await })
                };

                // First failure wins; the other task is left to finish on its own
                let (image_embedding, text_embedding) =
                    tokio::try_join!(joined(image_task), joined(text_task))?;

                fuse(&image_embedding, &text_embedding, self.settings.fusion)
            }
        }
    }
}

async fn joined<T>(handle: JoinHandle<CatalogResult<T>>) -> CatalogResult<T> {
    handle.await?
}
