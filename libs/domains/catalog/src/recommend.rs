use std::sync::Arc;

use futures::Stream;
use tracing::instrument;

use crate::cache::{SearchCache, read_json, write_json};
use crate::cache_key;
use crate::error::{CatalogError, CatalogResult};
use crate::llm::TextGenerator;
use crate::models::{MAX_RECOMMEND_PRODUCTS, ProductRecord, RecommendRequest, RecommendResponse};
use crate::prompt::{SYSTEM_PROMPT, build_product_context, build_user_message};
use crate::settings::CatalogSettings;
use crate::store::ProductStore;
use crate::streaming::{StreamEvent, event_stream};

/// Products resolved for one recommendation, in request order, plus the rendered prompt
#[derive(Debug, Clone)]
pub struct RecommendationSession {
    pub requested_ids: Vec<String>,
    pub products: Vec<ProductRecord>,
    pub user_message: String,
}

impl RecommendationSession {
    /// Resolve products with one batched lookup and render the prompt.
    ///
    /// Missing ids are dropped; nothing found at all is `NoSuchProducts`.
    pub async fn load(
        store: &dyn ProductStore,
        product_ids: &[String],
        user_query: Option<&str>,
    ) -> CatalogResult<Self> {
        validate_product_ids(product_ids)?;

        let mut found = store.fetch_products_by_ids(product_ids).await?;
        let products: Vec<ProductRecord> = product_ids
            .iter()
            .filter_map(|id| found.remove(id))
            .collect();

        if products.is_empty() {
            return Err(CatalogError::NoSuchProducts);
        }
        if products.len() < product_ids.len() {
            tracing::debug!(
                requested = product_ids.len(),
                found = products.len(),
                "some requested products were not found"
            );
        }

        let user_message = build_user_message(&build_product_context(&products), user_query);

        Ok(Self {
            requested_ids: product_ids.to_vec(),
            products,
            user_message,
        })
    }
}

fn validate_product_ids(product_ids: &[String]) -> CatalogResult<()> {
    if product_ids.is_empty() || product_ids.len() > MAX_RECOMMEND_PRODUCTS {
        return Err(CatalogError::InvalidProductIds {
            max: MAX_RECOMMEND_PRODUCTS,
            actual: product_ids.len(),
        });
    }
    Ok(())
}

/// Styling recommendation comments for a set of products
pub struct RecommendService {
    store: Arc<dyn ProductStore>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn SearchCache>,
    settings: CatalogSettings,
}

impl RecommendService {
    pub fn new(
        store: Arc<dyn ProductStore>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn SearchCache>,
    ) -> Self {
        Self {
            store,
            generator,
            cache,
            settings: CatalogSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CatalogSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Generate one complete comment. Responses are cached per product set and query.
    #[instrument(skip(self, request), fields(products = request.product_ids.len()))]
    pub async fn recommend(&self, request: &RecommendRequest) -> CatalogResult<RecommendResponse> {
        validate_product_ids(&request.product_ids)?;

        let key = cache_key::recommend_key(&request.product_ids, request.user_query.as_deref());
        if let Some(cached) = read_json::<RecommendResponse>(self.cache.as_ref(), &key).await {
            tracing::info!(cache_key = %key, "recommendation cache hit");
            return Ok(cached);
        }

        let comment = self
            .generate_comment(&request.product_ids, request.user_query.as_deref())
            .await?;

        let response = RecommendResponse {
            comment,
            product_ids: request.product_ids.clone(),
        };
        write_json(self.cache.as_ref(), &key, &response, self.settings.recommend_cache_ttl).await;
        tracing::info!("recommendation generated");

        Ok(response)
    }

    /// Generate a comment with a single generator call, without caching.
    pub async fn generate_comment(
        &self,
        product_ids: &[String],
        user_query: Option<&str>,
    ) -> CatalogResult<String> {
        let session = RecommendationSession::load(self.store.as_ref(), product_ids, user_query).await?;
        self.generator.generate(SYSTEM_PROMPT, &session.user_message).await
    }

    /// Stream the comment as `Delta* (Done | Error)`.
    ///
    /// Every failure, including an empty product set, is reported in-band as the
    /// final `Error` event.
    pub fn recommend_stream(&self, request: RecommendRequest) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let store = self.store.clone();
        let generator = self.generator.clone();

        event_stream(
            async move {
                let session = RecommendationSession::load(
                    store.as_ref(),
                    &request.product_ids,
                    request.user_query.as_deref(),
                )
                .await?;
                tracing::info!(products = session.products.len(), "recommendation stream started");
                generator.generate_stream(SYSTEM_PROMPT, &session.user_message).await
            },
            self.settings.fragment_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use futures::{StreamExt, stream};

    use crate::cache::MockSearchCache;
    use crate::error::{CacheError, RECOMMEND_UNAVAILABLE};
    use crate::llm::MockTextGenerator;
    use crate::store::MockProductStore;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn record(id: &str, name: &str) -> ProductRecord {
        ProductRecord {
            product_id: id.to_string(),
            name: name.to_string(),
            price: 45000,
            ..Default::default()
        }
    }

    fn store_with(records: Vec<ProductRecord>) -> MockProductStore {
        let mut store = MockProductStore::new();
        store.expect_fetch_products_by_ids().times(1).returning(move |_| {
            Ok(records
                .iter()
                .map(|r| (r.product_id.clone(), r.clone()))
                .collect::<HashMap<_, _>>())
        });
        store
    }

    fn empty_cache() -> MockSearchCache {
        let mut cache = MockSearchCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache.expect_set().returning(|_, _, _| Ok(()));
        cache
    }

    fn request(product_ids: &[&str], user_query: Option<&str>) -> RecommendRequest {
        RecommendRequest {
            product_ids: ids(product_ids),
            user_query: user_query.map(str::to_string),
        }
    }

    fn service(store: MockProductStore, generator: MockTextGenerator, cache: MockSearchCache) -> RecommendService {
        RecommendService::new(Arc::new(store), Arc::new(generator), Arc::new(cache))
    }

    #[tokio::test]
    async fn test_session_keeps_request_order_and_drops_missing() {
        let store = store_with(vec![record("p2", "Second"), record("p1", "First")]);

        let session = RecommendationSession::load(&store, &ids(&["p1", "p9", "p2"]), None)
            .await
            .unwrap();

        let names: Vec<_> = session.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert!(session.user_message.contains("[Product 1]\n- Name: First"));
        assert!(session.user_message.contains("[Product 2]\n- Name: Second"));
    }

    #[tokio::test]
    async fn test_no_generation_when_all_products_missing() {
        let store = store_with(Vec::new());
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();

        let err = service(store, generator, empty_cache())
            .recommend(&request(&["x", "y"], None))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::NoSuchProducts));
        assert_eq!(err.to_string(), "requested products not found");
    }

    #[tokio::test]
    async fn test_partial_lookup_still_generates() {
        let store = store_with(vec![record("p1", "Trench Coat")]);
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|system, message| {
                system == SYSTEM_PROMPT
                    && message.contains("Trench Coat")
                    && !message.contains("[Product 2]")
                    && message.starts_with("The user searched for 'minimal office look'")
            })
            .times(1)
            .returning(|_, _| Ok("Pair it with straight slacks.".to_string()));

        let response = service(store, generator, empty_cache())
            .recommend(&request(&["p1", "p2"], Some("minimal office look")))
            .await
            .unwrap();

        assert_eq!(response.comment, "Pair it with straight slacks.");
        assert_eq!(response.product_ids, ids(&["p1", "p2"]));
    }

    #[tokio::test]
    async fn test_cached_recommendation_skips_store_and_generator() {
        let cached = RecommendResponse {
            comment: "cached".to_string(),
            product_ids: ids(&["p2", "p1"]),
        };
        let payload = serde_json::to_string(&cached).unwrap();
        let expected_key = cache_key::recommend_key(&ids(&["p2", "p1"]), None);

        let mut cache = MockSearchCache::new();
        cache
            .expect_get()
            .withf(move |key| key == expected_key)
            .returning(move |_| Ok(Some(payload.clone())));
        cache.expect_set().never();

        let mut store = MockProductStore::new();
        store.expect_fetch_products_by_ids().never();
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();

        let response = service(store, generator, cache)
            .recommend(&request(&["p1", "p2"], None))
            .await
            .unwrap();
        assert_eq!(response, cached);
    }

    #[tokio::test]
    async fn test_generation_failure_is_not_cached() {
        let store = store_with(vec![record("p1", "Coat")]);
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(CatalogError::Generation("rate limited".to_string())));
        let mut cache = MockSearchCache::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError("down".to_string())));
        cache.expect_set().never();

        let err = service(store, generator, cache)
            .recommend(&request(&["p1"], None))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Generation(_)));
        assert_eq!(err.client_message(RECOMMEND_UNAVAILABLE), RECOMMEND_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_too_many_products() {
        let mut store = MockProductStore::new();
        store.expect_fetch_products_by_ids().never();
        let ids: Vec<String> = (0..11).map(|i| format!("p{}", i)).collect();

        let err = service(store, MockTextGenerator::new(), MockSearchCache::new())
            .recommend(&RecommendRequest {
                product_ids: ids,
                user_query: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidProductIds { max: 10, actual: 11 }));
    }

    #[tokio::test]
    async fn test_stream_emits_deltas_then_done() {
        let store = store_with(vec![record("p1", "Coat")]);
        let mut generator = MockTextGenerator::new();
        generator.expect_generate_stream().times(1).returning(|_, _| {
            Ok(stream::iter(["Pair ", "it ", "well."].map(|s| Ok(s.to_string()))).boxed())
        });

        let events: Vec<StreamEvent> = service(store, generator, MockSearchCache::new())
            .recommend_stream(request(&["p1"], None))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Pair ".to_string()),
                StreamEvent::Delta("it ".to_string()),
                StreamEvent::Delta("well.".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_with_no_products_is_a_single_error() {
        let store = store_with(Vec::new());
        let mut generator = MockTextGenerator::new();
        generator.expect_generate_stream().never();

        let events: Vec<StreamEvent> = service(store, generator, MockSearchCache::new())
            .recommend_stream(request(&["x"], None))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StreamEvent::Error("requested products not found".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stream_times_out_on_stalled_generator() {
        let store = store_with(vec![record("p1", "Coat")]);
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate_stream()
            .returning(|_, _| Ok(stream::pending().boxed()));

        let settings = CatalogSettings::default().with_fragment_timeout(Duration::from_millis(50));
        let events: Vec<StreamEvent> = service(store, generator, MockSearchCache::new())
            .with_settings(settings)
            .recommend_stream(request(&["p1"], None))
            .collect()
            .await;

        assert_eq!(events, vec![StreamEvent::Error(RECOMMEND_UNAVAILABLE.to_string())]);
    }
}
