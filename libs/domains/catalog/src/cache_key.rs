//! Deterministic cache keys for search and recommendation requests.
//!
//! A key is `<prefix>:<md5 hex>` over a canonical JSON document with sorted keys.
//! Two requests that mean the same thing always map to the same key.

use std::collections::BTreeMap;

use md5::Md5;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::models::{QueryType, SearchFilters};

pub const SEARCH_PREFIX: &str = "search";
pub const RECOMMEND_PREFIX: &str = "recommend";

const IMAGE_HASH_LEN: usize = 16;

/// Short content hash of a raw (base64) image payload.
pub fn image_hash(payload: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(payload.as_bytes()));
    hex.truncate(IMAGE_HASH_LEN);
    hex
}

/// Cache key for a classified search request.
pub fn search_key(
    query_type: QueryType,
    text: Option<&str>,
    image: Option<&str>,
    filters: &SearchFilters,
    limit: u32,
) -> String {
    let filters = filters.normalized();
    let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();

    canonical.insert("query_type", json!(query_type.as_str()));
    canonical.insert("limit", json!(limit));
    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        canonical.insert("query", json!(text));
    }
    if let Some(image) = image.map(str::trim).filter(|i| !i.is_empty()) {
        canonical.insert("image_hash", json!(image_hash(image)));
    }

    let text_fields = [
        ("category", filters.category),
        ("sub_category", filters.sub_category),
        ("brand", filters.brand),
        ("color", filters.color),
        ("season", filters.season),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            canonical.insert(field, json!(value));
        }
    }
    if let Some(min) = filters.min_price {
        canonical.insert("min_price", json!(min));
    }
    if let Some(max) = filters.max_price {
        canonical.insert("max_price", json!(max));
    }

    digest_key(SEARCH_PREFIX, &canonical)
}

/// Cache key for a recommendation request. Product order does not matter.
pub fn recommend_key(product_ids: &[String], user_query: Option<&str>) -> String {
    let mut ids: Vec<&str> = product_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();

    let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();
    canonical.insert("product_ids", json!(ids));
    canonical.insert("user_query", json!(user_query.map(str::trim).unwrap_or("")));

    digest_key(RECOMMEND_PREFIX, &canonical)
}

fn digest_key(prefix: &str, canonical: &BTreeMap<&str, Value>) -> String {
    // A BTreeMap of JSON values always serializes
    let serialized = serde_json::to_string(canonical).unwrap_or_default();
    format!("{}:{:x}", prefix, Md5::digest(serialized.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(category: &str, brand: &str) -> SearchFilters {
        SearchFilters {
            category: Some(category.to_string()),
            brand: Some(brand.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_search_key_is_deterministic() {
        let a = search_key(QueryType::Text, Some("linen shirt"), None, &filters("top", "acme"), 20);
        let b = search_key(QueryType::Text, Some("linen shirt"), None, &filters("top", "acme"), 20);
        assert_eq!(a, b);
        assert!(a.starts_with("search:"));
        assert_eq!(a.len(), "search:".len() + 32);
    }

    #[test]
    fn test_search_key_ignores_field_order_in_the_request() {
        let a: SearchFilters =
            serde_json::from_str(r#"{"category":"top","brand":"acme","max_price":9000}"#).unwrap();
        let b: SearchFilters =
            serde_json::from_str(r#"{"max_price":9000,"brand":"acme","category":"top"}"#).unwrap();
        assert_eq!(
            search_key(QueryType::Text, Some("q"), None, &a, 20),
            search_key(QueryType::Text, Some("q"), None, &b, 20)
        );
    }

    #[test]
    fn test_search_key_normalizes_text_and_blank_filters() {
        let blank = SearchFilters {
            brand: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            search_key(QueryType::Text, Some("  shirt "), None, &blank, 20),
            search_key(QueryType::Text, Some("shirt"), None, &SearchFilters::default(), 20)
        );
    }

    #[test]
    fn test_search_key_varies_with_inputs() {
        let base = search_key(QueryType::Text, Some("shirt"), None, &SearchFilters::default(), 20);
        assert_ne!(
            base,
            search_key(QueryType::Text, Some("shirt"), None, &SearchFilters::default(), 21)
        );
        assert_ne!(
            base,
            search_key(QueryType::Hybrid, Some("shirt"), Some("aGk="), &SearchFilters::default(), 20)
        );
        assert_ne!(
            search_key(QueryType::Image, None, Some("aGk="), &SearchFilters::default(), 20),
            search_key(QueryType::Image, None, Some("aGV5"), &SearchFilters::default(), 20)
        );
    }

    #[test]
    fn test_image_hash_is_truncated_sha256() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(image_hash("abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn test_recommend_key_ignores_product_order() {
        let a = recommend_key(&["b".to_string(), "a".to_string()], None);
        let b = recommend_key(&["a".to_string(), "b".to_string()], Some(""));
        assert_eq!(a, b);
        assert!(a.starts_with("recommend:"));
        assert_ne!(a, recommend_key(&["a".to_string(), "b".to_string()], Some("office look")));
    }
}
