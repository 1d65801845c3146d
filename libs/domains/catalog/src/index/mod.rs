mod pinecone;
mod repository;

pub use pinecone::{PineconeConfig, PineconeIndex};
pub use repository::VectorIndex;

#[cfg(test)]
pub use repository::MockVectorIndex;
