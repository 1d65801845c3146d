use crate::{ConfigError, FromEnv, env_or_default};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Redis configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl FromEnv for RedisConfig {
    /// Reads REDIS_URL, defaulting to a local instance
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("REDIS_URL", DEFAULT_REDIS_URL),
        })
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_from_env() {
        temp_env::with_var("REDIS_URL", Some("redis://cache:6380/1"), || {
            let config = RedisConfig::from_env().unwrap();
            assert_eq!(config.url, "redis://cache:6380/1");
        });
    }

    #[test]
    fn test_redis_config_defaults_to_localhost() {
        temp_env::with_var_unset("REDIS_URL", || {
            let config = RedisConfig::from_env().unwrap();
            assert_eq!(config.url, DEFAULT_REDIS_URL);
        });
    }
}
