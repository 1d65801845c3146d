use std::time::Duration;

use async_trait::async_trait;
use core_config::{ConfigError, Environment, FromEnv, env_or_default, env_parse_or_default, env_required_in_production};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::VectorIndex;
use crate::error::{CatalogError, CatalogResult};
use crate::filter::FilterPredicate;
use crate::models::{Embedding, RankedHit};

const PINECONE_API_VERSION: &str = "2025-01";

/// Vector ids are stored as `product_<product_id>`
const VECTOR_ID_PREFIX: &str = "product_";

/// Pinecone data-plane configuration
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Index host, e.g. `https://style-matcher-abc123.svc.us-east-1.pinecone.io`
    pub index_host: String,
    pub index_name: String,
    pub namespace: Option<String>,
    pub timeout_secs: u64,
}

impl PineconeConfig {
    pub fn new(api_key: String, index_host: String) -> Self {
        Self {
            api_key,
            index_host,
            index_name: "style-matcher".to_string(),
            namespace: None,
            timeout_secs: 30,
        }
    }

    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl FromEnv for PineconeConfig {
    /// PINECONE_API_KEY and PINECONE_INDEX_HOST are mandatory in production
    fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        Ok(Self {
            api_key: env_required_in_production("PINECONE_API_KEY", &environment)?,
            index_host: env_required_in_production("PINECONE_INDEX_HOST", &environment)?,
            index_name: env_or_default("PINECONE_INDEX", "style-matcher"),
            namespace: std::env::var("PINECONE_NAMESPACE").ok().filter(|n| !n.is_empty()),
            timeout_secs: env_parse_or_default("PINECONE_TIMEOUT_SECS", 30)?,
        })
    }
}

/// [`VectorIndex`] backed by the Pinecone REST query endpoint
pub struct PineconeIndex {
    client: Client,
    config: PineconeConfig,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build Pinecone client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> CatalogResult<Self> {
        Self::new(PineconeConfig::from_env()?)
    }

    fn query_url(&self) -> String {
        let host = self.config.index_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/query", host)
        } else {
            format!("https://{}/query", host)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
    filter: &'a FilterPredicate,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Debug, Deserialize)]
struct ScoredVector {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl From<ScoredVector> for RankedHit {
    fn from(matched: ScoredVector) -> Self {
        let product_id = matched
            .id
            .strip_prefix(VECTOR_ID_PREFIX)
            .unwrap_or(&matched.id)
            .to_string();

        RankedHit::new(product_id, matched.score).with_metadata(matched.metadata.unwrap_or_default())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self, vector, filter), fields(index = %self.config.index_name))]
    async fn query(
        &self,
        vector: &Embedding,
        top_k: u32,
        filter: &FilterPredicate,
    ) -> CatalogResult<Vec<RankedHit>> {
        let request = QueryRequest {
            vector: vector.values(),
            top_k,
            include_metadata: true,
            include_values: false,
            filter,
            namespace: self.config.namespace.as_deref(),
        };

        let response = self
            .client
            .post(self.query_url())
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| CatalogError::VectorIndex(format!("Pinecone request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::VectorIndex(format!(
                "Pinecone API error ({}): {}",
                status, error_text
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::VectorIndex(format!("invalid Pinecone response: {}", e)))?;

        tracing::debug!(matches = body.matches.len(), "Pinecone query complete");
        Ok(body.matches.into_iter().map(RankedHit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchFilters;
    use serde_json::json;

    #[test]
    fn test_match_id_prefix_is_stripped() {
        let matched: ScoredVector = serde_json::from_value(json!({
            "id": "product_12345",
            "score": 0.87,
            "metadata": { "category": "top", "price": 39000 }
        }))
        .unwrap();

        let hit = RankedHit::from(matched);
        assert_eq!(hit.product_id, "12345");
        assert_eq!(hit.score, 0.87);
        assert_eq!(hit.raw_metadata["category"], json!("top"));
    }

    #[test]
    fn test_unprefixed_id_and_missing_metadata() {
        let matched: ScoredVector =
            serde_json::from_value(json!({ "id": "abc", "score": 0.5 })).unwrap();
        let hit = RankedHit::from(matched);
        assert_eq!(hit.product_id, "abc");
        assert!(hit.raw_metadata.is_empty());
    }

    #[test]
    fn test_query_request_body() {
        let filter = FilterPredicate::build(&SearchFilters::default());
        let vector = [0.5f32, 0.5];
        let body = serde_json::to_value(QueryRequest {
            vector: &vector,
            top_k: 20,
            include_metadata: true,
            include_values: false,
            filter: &filter,
            namespace: None,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "vector": [0.5, 0.5],
                "topK": 20,
                "includeMetadata": true,
                "includeValues": false,
                "filter": { "is_soldout": { "$eq": false } }
            })
        );
    }

    #[test]
    fn test_query_url_accepts_bare_host() {
        let index = PineconeIndex::new(PineconeConfig::new(
            "key".to_string(),
            "idx-123.svc.pinecone.io/".to_string(),
        ))
        .unwrap();
        assert_eq!(index.query_url(), "https://idx-123.svc.pinecone.io/query");
    }

    #[test]
    fn test_pinecone_config_required_in_production() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("PINECONE_API_KEY", None),
                ("PINECONE_INDEX_HOST", Some("idx.pinecone.io")),
            ],
            || {
                let err = PineconeConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("PINECONE_API_KEY"));
            },
        );
    }
}
