use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_parse_or_default};

use crate::cache::DEFAULT_TTL;
use crate::fusion::{DEFAULT_IMAGE_WEIGHT, DEFAULT_TEXT_WEIGHT, FusionWeights};
use crate::streaming::DEFAULT_FRAGMENT_TIMEOUT;

/// Tunables shared by the search and recommendation services
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub fusion: FusionWeights,
    pub search_cache_ttl: Duration,
    pub recommend_cache_ttl: Duration,
    /// Longest wait for the next streamed fragment
    pub fragment_timeout: Duration,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            fusion: FusionWeights::default(),
            search_cache_ttl: DEFAULT_TTL,
            recommend_cache_ttl: DEFAULT_TTL,
            fragment_timeout: DEFAULT_FRAGMENT_TIMEOUT,
        }
    }
}

impl CatalogSettings {
    pub fn with_fusion(mut self, fusion: FusionWeights) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout = timeout;
        self
    }
}

impl FromEnv for CatalogSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let fusion = FusionWeights::new(
            env_parse_or_default("FUSION_IMAGE_WEIGHT", DEFAULT_IMAGE_WEIGHT)?,
            env_parse_or_default("FUSION_TEXT_WEIGHT", DEFAULT_TEXT_WEIGHT)?,
        );

        Ok(Self {
            fusion,
            search_cache_ttl: Duration::from_secs(env_parse_or_default(
                "SEARCH_CACHE_TTL",
                DEFAULT_TTL.as_secs(),
            )?),
            recommend_cache_ttl: Duration::from_secs(env_parse_or_default(
                "RECOMMEND_CACHE_TTL",
                DEFAULT_TTL.as_secs(),
            )?),
            fragment_timeout: Duration::from_secs(env_parse_or_default(
                "STREAM_FRAGMENT_TIMEOUT_SECS",
                DEFAULT_FRAGMENT_TIMEOUT.as_secs(),
            )?),
        })
    }
}
