//! Core types: the normalized product record and cache categories.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cache category for single-product lookups.
pub const PRODUCT_DETAILS: &str = "product_details";
/// Cache category for search result batches.
pub const SEARCH_RESULTS: &str = "search_results";
/// Cache category for category listings.
pub const CATEGORY_DATA: &str = "category_data";
/// Cache category for review payloads.
pub const PRODUCT_REVIEWS: &str = "product_reviews";
/// Cache category for trending lists.
pub const TRENDING_PRODUCTS: &str = "trending_products";

/// Stock status as reported by the upstream, normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl Availability {
    /// Interpret a provider's availability field.
    ///
    /// Booleans map directly; strings are matched loosely
    /// (`"in stock"`, `"available"`, `"true"` …). Anything else is
    /// [`Availability::Unknown`].
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(true) => Self::InStock,
            serde_json::Value::Bool(false) => Self::OutOfStock,
            serde_json::Value::String(s) => {
                let s = s.trim().to_lowercase().replace(['_', '-'], " ");
                match s.as_str() {
                    "in stock" | "instock" | "available" | "true" | "yes" => Self::InStock,
                    "out of stock" | "outofstock" | "unavailable" | "sold out" | "false"
                    | "no" => Self::OutOfStock,
                    _ => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        }
    }
}

/// A product normalized from any upstream provider.
///
/// Constructed once by a provider and never mutated afterwards; callers
/// that want to enrich a record clone it first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Provider-scoped identifier (SKU, ASIN, …).
    pub id: String,
    pub title: String,
    pub brand: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<f64>,
    pub category: String,
    pub description: String,
    /// Average customer rating, typically 0.0–5.0.
    pub rating: f64,
    pub review_count: u64,
    pub availability: Availability,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, serde_json::Value>,
    pub url: String,
    /// Name of the provider (or sub-endpoint) that produced this record.
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Popularity used for ranking merged results: `rating × reviewCount`.
    pub fn popularity(&self) -> f64 {
        self.rating * self.review_count as f64
    }
}

impl fmt::Display for ProductRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:.2})", self.title, self.source_id, self.price)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(title: &str, source: &str, rating: f64, reviews: u64) -> ProductRecord {
    ProductRecord {
        id: format!("{source}-{}", title.len()),
        title: title.to_string(),
        brand: "Acme".into(),
        price: 999.0,
        sale_price: None,
        category: "Laptops".into(),
        description: format!("{title} description"),
        rating,
        review_count: reviews,
        availability: Availability::InStock,
        images: vec![],
        specifications: BTreeMap::new(),
        url: format!("https://example.com/{source}"),
        source_id: source.to_string(),
        fetched_at: Utc::now(),
    }
}
