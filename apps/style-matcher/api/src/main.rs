use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_catalog::{
    CatalogState, ClipHttpEmbedder, ClipImageCodec, OpenAiGenerator, PineconeIndex,
    RecommendService, RedisCache, SearchService, SupabaseProductStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Before any fallible operation, so startup errors are rendered too
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    let cache = RedisCache::connect(&config.redis.url)
        .await
        .map_err(|e| eyre::eyre!("Redis connection failed: {}", e))?;

    let embedder = Arc::new(ClipHttpEmbedder::new(config.clip.clone())?);
    let index = Arc::new(PineconeIndex::new(config.pinecone.clone())?);
    let store = Arc::new(SupabaseProductStore::new(config.supabase.clone())?);
    let generator = Arc::new(OpenAiGenerator::new(config.openai.clone())?);
    let shared_cache = Arc::new(cache.clone());

    let search = SearchService::new(
        embedder,
        Arc::new(ClipImageCodec),
        index,
        store.clone(),
        shared_cache.clone(),
    )
    .with_settings(config.catalog.clone());
    let recommend = RecommendService::new(store, generator, shared_cache)
        .with_settings(config.catalog.clone());

    let state = AppState {
        config,
        cache,
        catalog: CatalogState::new(search, recommend),
    };

    let api_routes = api::routes(&state);

    // Docs, tracing, CORS and security headers around /api
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes)?;

    let app = router
        .merge(health_router(state.config.app.clone()))
        .merge(api::ready_router(state.clone()));

    let server_config = state.config.server.clone();

    info!(
        model = %state.config.openai.model,
        index = %state.config.pinecone.index_name,
        "Starting Style Matcher API (30s shutdown timeout)"
    );

    create_production_app(
        app,
        &server_config,
        Duration::from_secs(30),
        async move {
            // Redis ConnectionManager closes on drop
            drop(state);
            info!("Released backend connections");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Style Matcher API shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_lists_catalog_routes() {
        let doc = openapi::ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/v1/search"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/recommend"));
        assert_eq!(doc.info.title, "Style Matcher API");
    }

    #[tokio::test]
    async fn test_health_reports_package_name() {
        let response = health_router(core_config::app_info!())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["name"], "style_matcher_api");
    }
}
