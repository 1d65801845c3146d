use core_config::{AppInfo, FromEnv, app_info, redis::RedisConfig, server::ServerConfig};
use domain_catalog::{ClipConfig, OpenAiConfig, PineconeConfig, SupabaseConfig};
use domain_catalog::CatalogSettings;

pub use core_config::Environment;

/// Application configuration, composed from the shared config components and
/// the catalog adapters' own settings
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub environment: Environment,
    pub clip: ClipConfig,
    pub pinecone: PineconeConfig,
    pub supabase: SupabaseConfig,
    pub openai: OpenAiConfig,
    pub catalog: CatalogSettings,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();

        Ok(Self {
            app: app_info!(),
            server: ServerConfig::from_env()?, // HOST=0.0.0.0, PORT=8000
            redis: RedisConfig::from_env()?,
            environment,
            clip: ClipConfig::from_env()?,
            pinecone: PineconeConfig::from_env()?, // Credentials required in production
            supabase: SupabaseConfig::from_env()?, // Credentials required in production
            openai: OpenAiConfig::from_env()?,
            catalog: CatalogSettings::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_needs_no_credentials() {
        temp_env::with_vars(
            [
                ("APP_ENV", None::<&str>),
                ("PINECONE_API_KEY", None),
                ("PINECONE_INDEX_HOST", None),
                ("SUPABASE_URL", None),
                ("SUPABASE_SERVICE_KEY", None),
                ("PORT", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.environment.is_development());
                assert_eq!(config.server.port, 8000);
                assert_eq!(config.app.name, "style_matcher_api");
            },
        );
    }

    #[test]
    fn test_production_config_requires_credentials() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("PINECONE_API_KEY", None::<&str>),
                ("SUPABASE_URL", None),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
