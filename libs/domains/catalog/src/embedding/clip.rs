use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or_default};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingService;
use crate::error::{CatalogError, CatalogResult};
use crate::imaging::PreparedImage;
use crate::models::{EMBEDDING_DIM, Embedding};

const DEFAULT_CLIP_URL: &str = "http://localhost:8001";

/// CLIP inference server configuration
#[derive(Debug, Clone)]
pub struct ClipConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ClipConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            api_key: None,
            timeout_secs: 30,
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl FromEnv for ClipConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_or_default("CLIP_SERVICE_URL", DEFAULT_CLIP_URL),
            api_key: std::env::var("CLIP_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: env_parse_or_default("CLIP_TIMEOUT_SECS", 30)?,
        })
    }
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_URL.to_string())
    }
}

/// Embeddings from a CLIP ViT-B/32 inference server over HTTP
pub struct ClipHttpEmbedder {
    client: Client,
    config: ClipConfig,
}

impl ClipHttpEmbedder {
    pub fn new(config: ClipConfig) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build CLIP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> CatalogResult<Self> {
        Self::new(ClipConfig::from_env()?)
    }

    async fn post_embed<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> CatalogResult<Embedding> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.config.base_url.trim_end_matches('/'), path))
            .json(body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Embedding(format!("CLIP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Embedding(format!(
                "CLIP server error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Embedding(format!("invalid CLIP response: {}", e)))?;

        Embedding::normalized(body.embedding, EMBEDDING_DIM)
    }
}

#[derive(Debug, Serialize)]
struct TextEmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageEmbedRequest {
    width: u32,
    height: u32,
    /// Base64 of the raw RGB8 pixel buffer
    pixels: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for ClipHttpEmbedder {
    async fn embed_text(&self, text: &str) -> CatalogResult<Embedding> {
        self.post_embed("embed/text", &TextEmbedRequest { text }).await
    }

    async fn embed_image(&self, image: &PreparedImage) -> CatalogResult<Embedding> {
        let request = ImageEmbedRequest {
            width: image.width,
            height: image.height,
            pixels: BASE64.encode(&image.rgb),
        };
        self.post_embed("embed/image", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_config_from_env_defaults() {
        temp_env::with_vars(
            [
                ("CLIP_SERVICE_URL", None::<&str>),
                ("CLIP_API_KEY", None::<&str>),
                ("CLIP_TIMEOUT_SECS", None::<&str>),
            ],
            || {
                let config = ClipConfig::from_env().unwrap();
                assert_eq!(config.base_url, DEFAULT_CLIP_URL);
                assert!(config.api_key.is_none());
                assert_eq!(config.timeout_secs, 30);
            },
        );
    }

    #[test]
    fn test_clip_config_builder() {
        let config = ClipConfig::new("http://clip:9000".to_string())
            .with_api_key("secret".to_string())
            .with_timeout(5);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_embedding_error() {
        let embedder = ClipHttpEmbedder::new(ClipConfig::new("http://127.0.0.1:1".to_string()).with_timeout(2)).unwrap();
        let err = embedder.embed_text("shirt").await.unwrap_err();
        assert!(matches!(err, CatalogError::Embedding(_)));
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        let err = Embedding::normalized(vec![1.0; 3], EMBEDDING_DIM).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidEmbeddingDimension { expected: 512, actual: 3 }
        ));
    }
}
