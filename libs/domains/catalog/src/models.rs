use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{CatalogError, CatalogResult};

/// Dimension of the shared CLIP image/text embedding space.
pub const EMBEDDING_DIM: usize = 512;

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;
pub const MAX_RECOMMEND_PRODUCTS: usize = 10;

/// Search mode derived from which inputs are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Text,
    Image,
    Hybrid,
}

impl QueryType {
    /// Classify a request by presence of non-blank text and a non-blank image payload.
    ///
    /// Only presence is inspected here; the image payload is decoded later, on a cache miss.
    pub fn classify(text: Option<&str>, image: Option<&str>) -> CatalogResult<Self> {
        let has_text = text.is_some_and(|t| !t.trim().is_empty());
        let has_image = image.is_some_and(|i| !i.trim().is_empty());

        match (has_text, has_image) {
            (true, true) => Ok(QueryType::Hybrid),
            (false, true) => Ok(QueryType::Image),
            (true, false) => Ok(QueryType::Text),
            (false, false) => Err(CatalogError::InvalidQuery),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Text => "text",
            QueryType::Image => "image",
            QueryType::Hybrid => "hybrid",
        }
    }
}

/// A classified query with its payloads decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Text(String),
    Image(Vec<u8>),
    Hybrid { image: Vec<u8>, text: String },
}

impl Query {
    /// Build the typed query for an already classified request.
    ///
    /// Fails with `InvalidImage` when the base64 payload does not decode.
    pub fn decode(query_type: QueryType, text: Option<&str>, image: Option<&str>) -> CatalogResult<Self> {
        let text = || text.map(|t| t.trim().to_string()).unwrap_or_default();
        let image = || decode_image_payload(image.unwrap_or_default());

        Ok(match query_type {
            QueryType::Text => Query::Text(text()),
            QueryType::Image => Query::Image(image()?),
            QueryType::Hybrid => Query::Hybrid {
                image: image()?,
                text: text(),
            },
        })
    }

    pub fn query_type(&self) -> QueryType {
        match self {
            Query::Text(_) => QueryType::Text,
            Query::Image(_) => QueryType::Image,
            Query::Hybrid { .. } => QueryType::Hybrid,
        }
    }
}

fn decode_image_payload(payload: &str) -> CatalogResult<Vec<u8>> {
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| CatalogError::InvalidImage("payload is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(CatalogError::InvalidImage("image payload is empty".to_string()));
    }
    Ok(bytes)
}

/// Unit-length embedding vector (or the explicit zero vector produced by fusion)
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Accept a backend vector, checking its dimension and L2-normalising it.
    pub fn normalized(values: Vec<f32>, expected_dim: usize) -> CatalogResult<Self> {
        if values.len() != expected_dim {
            return Err(CatalogError::InvalidEmbeddingDimension {
                expected: expected_dim,
                actual: values.len(),
            });
        }
        let mut embedding = Self(values);
        let norm = embedding.norm();
        if norm > 0.0 {
            embedding.0.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(embedding)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f32> {
        self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

/// Optional user-facing search filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub brand: Option<String>,
    #[validate(range(min = 0))]
    pub min_price: Option<i64>,
    #[validate(range(min = 0))]
    pub max_price: Option<i64>,
    pub color: Option<String>,
    pub season: Option<String>,
}

impl SearchFilters {
    /// Trim text fields and drop the blank ones, so that `""` and a missing field mean the same.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            category: clean(&self.category),
            sub_category: clean(&self.sub_category),
            brand: clean(&self.brand),
            min_price: self.min_price,
            max_price: self.max_price,
            color: clean(&self.color),
            season: clean(&self.season),
        }
    }
}

/// Search request body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SearchRequest {
    /// Free-text query
    #[serde(default)]
    pub query: Option<String>,
    /// Base64 encoded image (~10MB max)
    #[serde(default)]
    #[validate(length(max = 14_000_000))]
    pub image: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

impl SearchRequest {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            image: None,
            filters: SearchFilters::default(),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image = Some(image_base64.into());
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// A ranked match from the vector index
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub product_id: String,
    pub score: f32,
    /// Opaque index metadata, only read by the degraded merge path
    pub raw_metadata: serde_json::Map<String, serde_json::Value>,
}

impl RankedHit {
    pub fn new(product_id: impl Into<String>, score: f32) -> Self {
        Self {
            product_id: product_id.into(),
            score,
            raw_metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.raw_metadata = metadata;
        self
    }
}

/// Product row from the relational store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub name_ko: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub style_tags: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One search result as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductResult {
    pub product_id: String,
    pub name: String,
    pub name_ko: Option<String>,
    pub price: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub style_tags: Vec<String>,
    pub color: Option<String>,
    pub image_url: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<ProductResult>,
    pub total: usize,
    pub query_type: QueryType,
}

impl SearchResponse {
    pub fn new(results: Vec<ProductResult>, query_type: QueryType) -> Self {
        Self {
            total: results.len(),
            results,
            query_type,
        }
    }
}

/// Recommendation request body
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecommendRequest {
    #[validate(length(min = 1, max = 10))]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub user_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecommendResponse {
    pub comment: String,
    pub product_ids: Vec<String>,
}
