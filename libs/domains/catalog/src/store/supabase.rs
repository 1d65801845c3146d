use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use core_config::{ConfigError, Environment, FromEnv, env_or_default, env_parse_or_default, env_required_in_production};
use reqwest::Client;
use tracing::instrument;

use super::ProductStore;
use crate::error::{CatalogError, CatalogResult};
use crate::models::ProductRecord;

const SEARCH_COLUMNS: &str =
    "product_id,name,name_ko,price,brand,category,sub_category,style_tags,color,image_url";

const RECOMMEND_COLUMNS: &str = "product_id,name,name_ko,price,brand,category,sub_category,\
                                 style_tags,color,material,season,description";

/// Supabase (PostgREST) configuration
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub table: String,
    pub timeout_secs: u64,
}

impl SupabaseConfig {
    pub fn new(url: String, service_key: String) -> Self {
        Self {
            url,
            service_key,
            table: "products".to_string(),
            timeout_secs: 30,
        }
    }

    pub fn with_table(mut self, table: String) -> Self {
        self.table = table;
        self
    }
}

impl FromEnv for SupabaseConfig {
    /// SUPABASE_URL and SUPABASE_SERVICE_KEY are mandatory in production
    fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        Ok(Self {
            url: env_required_in_production("SUPABASE_URL", &environment)?,
            service_key: env_required_in_production("SUPABASE_SERVICE_KEY", &environment)?,
            table: env_or_default("SUPABASE_PRODUCTS_TABLE", "products"),
            timeout_secs: env_parse_or_default("SUPABASE_TIMEOUT_SECS", 30)?,
        })
    }
}

/// [`ProductStore`] over the Supabase REST interface
pub struct SupabaseProductStore {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseProductStore {
    pub fn new(config: SupabaseConfig) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build Supabase client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> CatalogResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        )
    }

    async fn select_in(
        &self,
        columns: &str,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, ProductRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_filter = in_filter(ids);
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", columns), ("product_id", id_filter.as_str())])
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .map_err(|e| CatalogError::ProductStore(format!("Supabase request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ProductStore(format!(
                "Supabase API error ({}): {}",
                status, error_text
            )));
        }

        let rows: Vec<ProductRecord> = response
            .json()
            .await
            .map_err(|e| CatalogError::ProductStore(format!("invalid Supabase response: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.product_id.clone(), row))
            .collect())
    }
}

/// PostgREST `in.(...)` operand with every id double-quoted
fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl ProductStore for SupabaseProductStore {
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_by_ids(&self, ids: &[String]) -> CatalogResult<HashMap<String, ProductRecord>> {
        self.select_in(SEARCH_COLUMNS, ids).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_products_by_ids(
        &self,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, ProductRecord>> {
        self.select_in(RECOMMEND_COLUMNS, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_filter_quotes_ids() {
        let ids = vec!["p1".to_string(), "a,b".to_string(), "say \"hi\"".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("p1","a,b","say \"hi\"")"#);
    }

    #[test]
    fn test_table_url() {
        let store = SupabaseProductStore::new(SupabaseConfig::new(
            "https://xyz.supabase.co/".to_string(),
            "service".to_string(),
        ))
        .unwrap();
        assert_eq!(store.table_url(), "https://xyz.supabase.co/rest/v1/products");
    }

    #[tokio::test]
    async fn test_empty_id_list_skips_the_request() {
        let store = SupabaseProductStore::new(SupabaseConfig::new(
            "http://127.0.0.1:1".to_string(),
            String::new(),
        ))
        .unwrap();
        assert!(store.fetch_by_ids(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_supabase_config_defaults_in_development() {
        temp_env::with_vars(
            [
                ("APP_ENV", None::<&str>),
                ("SUPABASE_URL", None),
                ("SUPABASE_SERVICE_KEY", None),
                ("SUPABASE_PRODUCTS_TABLE", None),
            ],
            || {
                let config = SupabaseConfig::from_env().unwrap();
                assert_eq!(config.url, "");
                assert_eq!(config.table, "products");
            },
        );
    }

    #[test]
    fn test_recommend_columns_include_descriptive_fields() {
        for column in ["material", "season", "description"] {
            assert!(RECOMMEND_COLUMNS.contains(column));
            assert!(!SEARCH_COLUMNS.contains(column));
        }
    }
}
