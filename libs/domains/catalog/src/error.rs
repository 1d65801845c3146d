use std::time::Duration;

use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

/// Message shown to callers whenever a collaborator failed.
pub const SEARCH_UNAVAILABLE: &str = "search service temporarily unavailable";
pub const RECOMMEND_UNAVAILABLE: &str = "recommendation service temporarily unavailable";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("at least one of query or image is required")]
    InvalidQuery,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("limit must be between 1 and {max}, got {actual}")]
    InvalidLimit { max: u32, actual: u32 },

    #[error("between 1 and {max} product ids are required, got {actual}")]
    InvalidProductIds { max: usize, actual: usize },

    #[error("requested products not found")]
    NoSuchProducts,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Product store error: {0}")]
    ProductStore(String),

    #[error("Text generation error: {0}")]
    Generation(String),

    #[error("no fragment received within {0:?}")]
    StreamTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Errors caused by the caller's input. These are reported verbatim and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidQuery
                | CatalogError::InvalidImage(_)
                | CatalogError::InvalidLimit { .. }
                | CatalogError::InvalidProductIds { .. }
                | CatalogError::NoSuchProducts
        )
    }

    /// Message that is safe to hand to a client. Collaborator failures collapse into `fallback`.
    pub fn client_message(&self, fallback: &str) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            fallback.to_string()
        }
    }
}

/// Failure of the cache layer.
///
/// Deliberately has no conversion into [`CatalogError`]: `?` cannot forward it, so every
/// call site has to decide to discard it (read -> miss, write -> no-op).
#[derive(Debug, Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Internal(format!("JSON error: {}", err))
    }
}

impl From<core_config::ConfigError> for CatalogError {
    fn from(err: core_config::ConfigError) -> Self {
        CatalogError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CatalogError {
    fn from(err: tokio::task::JoinError) -> Self {
        CatalogError::Internal(format!("background task failed: {}", err))
    }
}

impl CatalogError {
    /// HTTP error for this failure; service failures read `unavailable`.
    pub fn into_app_error(self, unavailable: &str) -> AppError {
        if self.is_client_error() {
            return AppError::BadRequest(self.to_string());
        }

        tracing::error!(error = %self, "catalog collaborator failure");
        AppError::ServiceUnavailable(unavailable.to_string())
    }
}

/// Convert CatalogError to AppError for standardized HTTP error responses
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let unavailable = match err {
            CatalogError::Generation(_) | CatalogError::StreamTimeout(_) => RECOMMEND_UNAVAILABLE,
            _ => SEARCH_UNAVAILABLE,
        };
        err.into_app_error(unavailable)
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
