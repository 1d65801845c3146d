//! Shared application state.

use domain_catalog::{CatalogState, RedisCache};

/// Cloned per handler; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded from environment variables
    pub config: crate::config::Config,
    /// Redis connection manager, shared with the catalog services as their cache
    pub cache: RedisCache,
    /// Search and recommendation services
    pub catalog: CatalogState,
}
