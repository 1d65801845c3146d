//! Vector index filter predicates.
//!
//! The predicate is a typed struct whose serde form is the index's metadata filter
//! syntax (`{"field": {"$eq": value}}`, `{"price": {"$gte": a, "$lte": b}}`).

use serde::Serialize;

use crate::models::SearchFilters;

/// `{"$eq": value}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equals<T> {
    #[serde(rename = "$eq")]
    pub value: T,
}

impl<T> Equals<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

/// Inclusive price bounds, either side optional
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRange {
    #[serde(rename = "$gte", skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(rename = "$lte", skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

/// Conjunction of equality and range conditions applied to a vector query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPredicate {
    pub is_soldout: Equals<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Equals<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<Equals<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<Equals<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Equals<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Equals<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceRange>,
}

impl FilterPredicate {
    /// Build the predicate for a set of user filters.
    ///
    /// Sold-out products are always excluded. Blank text fields are ignored and
    /// `min_price > max_price` is passed through unchecked.
    pub fn build(filters: &SearchFilters) -> Self {
        let filters = filters.normalized();

        let price = match (filters.min_price, filters.max_price) {
            (None, None) => None,
            (min, max) => Some(PriceRange { min, max }),
        };

        Self {
            is_soldout: Equals::new(false),
            category: filters.category.map(Equals::new),
            sub_category: filters.sub_category.map(Equals::new),
            brand: filters.brand.map(Equals::new),
            color: filters.color.map(Equals::new),
            season: filters.season.map(Equals::new),
            price,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain structs of strings, bools and integers cannot fail
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Default for FilterPredicate {
    fn default() -> Self {
        Self::build(&SearchFilters::default())
    }
}
