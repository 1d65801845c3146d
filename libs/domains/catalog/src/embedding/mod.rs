mod clip;
mod provider;

pub use clip::{ClipConfig, ClipHttpEmbedder};
pub use provider::EmbeddingService;

#[cfg(test)]
pub use provider::MockEmbeddingService;
