use std::collections::HashMap;

use crate::models::{ProductRecord, ProductResult, RankedHit};

const UNKNOWN_PRODUCT_NAME: &str = "Unknown";

/// Join ranked vector hits with relational records.
///
/// Output order is exactly hit order. Hits without a record are kept as degraded results
/// built from the index metadata.
pub fn merge(hits: &[RankedHit], records: &HashMap<String, ProductRecord>) -> Vec<ProductResult> {
    hits.iter()
        .map(|hit| match records.get(&hit.product_id) {
            Some(record) => from_record(hit, record),
            None => degraded(hit),
        })
        .collect()
}

fn from_record(hit: &RankedHit, record: &ProductRecord) -> ProductResult {
    ProductResult {
        product_id: hit.product_id.clone(),
        name: record.name.clone(),
        name_ko: record.name_ko.clone(),
        price: record.price,
        brand: record.brand.clone(),
        category: record.category.clone(),
        sub_category: record.sub_category.clone(),
        style_tags: record.style_tags.clone(),
        color: record.color.clone(),
        image_url: record.image_url.clone(),
        score: hit.score,
    }
}

fn degraded(hit: &RankedHit) -> ProductResult {
    tracing::debug!(product_id = %hit.product_id, "no product record for hit, using index metadata");

    // The category doubles as a display name when the record is missing
    let name = hit
        .raw_metadata
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or(UNKNOWN_PRODUCT_NAME)
        .to_string();

    let price = hit
        .raw_metadata
        .get("price")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0);

    ProductResult {
        product_id: hit.product_id.clone(),
        name,
        name_ko: None,
        price,
        brand: None,
        category: None,
        sub_category: None,
        style_tags: Vec::new(),
        color: None,
        image_url: String::new(),
        score: hit.score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, name: &str, price: i64) -> ProductRecord {
        ProductRecord {
            product_id: id.to_string(),
            name: name.to_string(),
            price,
            image_url: format!("https://cdn.example.com/{id}.jpg"),
            style_tags: vec!["casual".to_string()],
            ..Default::default()
        }
    }

    fn metadata(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_merge_preserves_hit_order() {
        let hits = vec![
            RankedHit::new("p3", 0.9),
            RankedHit::new("p1", 0.8),
            RankedHit::new("p2", 0.7),
        ];
        let records: HashMap<_, _> = ["p1", "p2", "p3"]
            .into_iter()
            .map(|id| (id.to_string(), record(id, id, 1000)))
            .collect();

        let merged = merge(&hits, &records);

        let ids: Vec<_> = merged.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
        assert_eq!(merged[0].score, 0.9);
        assert_eq!(merged[1].image_url, "https://cdn.example.com/p1.jpg");
    }

    #[test]
    fn test_missing_record_is_degraded_from_metadata() {
        let hits = vec![
            RankedHit::new("p1", 0.9),
            RankedHit::new("p2", 0.5)
                .with_metadata(metadata(json!({ "category": "outer", "price": 59000.0 }))),
        ];
        let records = HashMap::from([("p1".to_string(), record("p1", "Denim Jacket", 89000))]);

        let merged = merge(&hits, &records);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Denim Jacket");
        assert_eq!(merged[1].name, "outer");
        assert_eq!(merged[1].price, 59000);
        assert_eq!(merged[1].image_url, "");
        assert!(merged[1].brand.is_none());
        assert_eq!(merged[1].score, 0.5);
    }

    #[test]
    fn test_partial_lookup_keeps_rank_order() {
        let hits = vec![
            RankedHit::new("p3", 0.9)
                .with_metadata(metadata(json!({ "category": "bottom", "price": 39000.0 }))),
            RankedHit::new("p1", 0.8),
            RankedHit::new("p2", 0.7),
        ];
        let records = HashMap::from([
            ("p1".to_string(), record("p1", "Wool Coat", 129000)),
            ("p2".to_string(), record("p2", "Linen Shirt", 49000)),
        ]);

        let merged = merge(&hits, &records);

        let ids: Vec<_> = merged.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
        assert_eq!(merged[0].name, "bottom");
        assert_eq!(merged[0].image_url, "");
        assert_eq!(merged[1].name, "Wool Coat");
        assert_eq!(merged[2].name, "Linen Shirt");
        assert_eq!(merged[2].score, 0.7);
    }

    #[test]
    fn test_degraded_without_metadata() {
        let merged = merge(&[RankedHit::new("p9", 0.1)], &HashMap::new());
        assert_eq!(merged[0].name, "Unknown");
        assert_eq!(merged[0].price, 0);
        assert!(merged[0].style_tags.is_empty());
    }

    #[test]
    fn test_no_hits() {
        assert!(merge(&[], &HashMap::new()).is_empty());
    }
}
