//! Catalog Domain
//!
//! Multimodal product search (text, image or both) over a vector index, and
//! LLM styling comments for a chosen set of products.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          Handlers            │  ← /search, /recommend[?stream=true]
//! └──────────────┬───────────────┘
//!                │
//! ┌──────────────▼───────────────┐
//! │ SearchService  RecommendSvc  │  ← cache-aside, fusion, merge, prompt, streaming
//! └──────────────┬───────────────┘
//!                │
//! ┌──────────────▼───────────────┐
//! │  Collaborator traits         │  ← EmbeddingService, ImageCodec, VectorIndex,
//! │                              │    ProductStore, SearchCache, TextGenerator
//! └──────────────┬───────────────┘
//!                │
//! ┌──────────────▼───────────────┐
//! │  Adapters                    │  ← CLIP HTTP, Pinecone, Supabase, Redis, OpenAI
//! └──────────────────────────────┘
//! ```
//!
//! Collaborators are injected as `Arc<dyn Trait>` so services can be exercised
//! with mocks and wired to real backends in the binary.

pub mod cache;
pub mod cache_key;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod handlers;
pub mod imaging;
pub mod index;
pub mod llm;
pub mod merger;
pub mod models;
pub mod prompt;
pub mod recommend;
pub mod search;
pub mod settings;
pub mod store;
pub mod streaming;

pub use error::{CacheError, CatalogError, CatalogResult};
pub use models::{
    Embedding, ProductRecord, ProductResult, Query, QueryType, RankedHit, RecommendRequest,
    RecommendResponse, SearchFilters, SearchRequest, SearchResponse,
};
pub use recommend::{RecommendService, RecommendationSession};
pub use search::SearchService;
pub use settings::CatalogSettings;
pub use streaming::StreamEvent;

// Collaborators
pub use cache::{RedisCache, SearchCache};
pub use embedding::{ClipConfig, ClipHttpEmbedder, EmbeddingService};
pub use imaging::{ClipImageCodec, ImageCodec, PreparedImage};
pub use index::{PineconeConfig, PineconeIndex, VectorIndex};
pub use llm::{OpenAiConfig, OpenAiGenerator, TextGenerator};
pub use store::{ProductStore, SupabaseConfig, SupabaseProductStore};

// Re-export handler types
pub use handlers::{CatalogApiDoc, CatalogState};
