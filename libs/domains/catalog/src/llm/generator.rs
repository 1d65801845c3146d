use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::streaming::FragmentStream;

/// Chat-style text generation backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a complete reply
    async fn generate(&self, system_prompt: &str, user_message: &str) -> CatalogResult<String>;

    /// Open an incremental generation session.
    ///
    /// The returned stream yields text fragments in order and ends when the reply is
    /// complete; an `Err` item aborts the session.
    async fn generate_stream(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> CatalogResult<FragmentStream>;
}
