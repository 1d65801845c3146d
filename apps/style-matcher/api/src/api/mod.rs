use axum::Router;
use axum::routing::get;

pub mod health;

/// API routes without the `/api` prefix, which `create_router` adds.
pub fn routes(state: &crate::state::AppState) -> Router {
    Router::new().nest("/v1", domain_catalog::handlers::router(state.catalog.clone()))
}

/// `/ready`, checking the Redis connection.
pub fn ready_router(state: crate::state::AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
