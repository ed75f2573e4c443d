//! Retail catalog API provider (primary source).
//!
//! Search: `GET {base}{search_path}?apiKey=..&format=json&q=..&limit=..&sort=..`
//! returning `{"products": [...]}`. Details: `GET {base}{details_path}/{id}`,
//! where 404 means the product does not exist.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Upstream, image_list, normalize_query, number_field, string_field};
use crate::cache::TieredCache;
use crate::config::{ProviderConfig, ProviderDescriptor};
use crate::error::CatalogError;
use crate::provider::CatalogProvider;
use crate::types::{Availability, PRODUCT_DETAILS, ProductRecord, SEARCH_RESULTS};

/// Best-rated first.
const SORT_ORDER: &str = "customerReviewAverage.dsc";

/// Fields requested on search so responses stay small.
const SHOW_FIELDS: &str = "sku,name,manufacturer,regularPrice,salePrice,categoryPath,\
longDescription,customerReviewAverage,customerReviewCount,onlineAvailability,image,url,details";

/// Client for a single retail catalog endpoint.
pub struct RetailProvider {
    upstream: Upstream,
    endpoint: ProviderDescriptor,
}

impl RetailProvider {
    /// Build a provider from `config`, using its first endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Config`] if `config` does not validate or the
    /// HTTP client cannot be built.
    pub fn new(config: ProviderConfig, cache: Arc<TieredCache>) -> Result<Self, CatalogError> {
        let upstream = Upstream::new(config, cache)?;
        let endpoint = upstream
            .config
            .endpoints
            .first()
            .cloned()
            .ok_or_else(|| CatalogError::Config("retail provider needs an endpoint".into()))?;
        Ok(Self { upstream, endpoint })
    }

    fn cache(&self) -> &TieredCache {
        &self.upstream.cache
    }
}

#[async_trait]
impl CatalogProvider for RetailProvider {
    fn name(&self) -> &str {
        &self.upstream.config.name
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, CatalogError> {
        let identifier = format!("{}:{}:{limit}", self.endpoint.name, normalize_query(query));
        if let Some(cached) = self
            .cache()
            .get_json::<Vec<ProductRecord>>(SEARCH_RESULTS, &identifier)
            .await
        {
            tracing::debug!(
                provider = %self.name(),
                count = cached.len(),
                "search served from cache"
            );
            return Ok(cached);
        }

        tracing::trace!(provider = %self.name(), query, limit, "retail search");
        let url = self.endpoint.search_url();
        let limit_param = limit.to_string();
        let request = || {
            self.upstream.client.get(&url).query(&[
                ("apiKey", self.endpoint.credential.as_str()),
                ("format", "json"),
                ("q", query),
                ("limit", limit_param.as_str()),
                ("sort", SORT_ORDER),
                ("show", SHOW_FIELDS),
            ])
        };

        let body = match self.upstream.fetch(request, &self.endpoint.name).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    provider = %self.name(),
                    error = %e,
                    "search failed, returning no results"
                );
                return Ok(Vec::new());
            }
        };

        let records = parse_search(&body, &self.endpoint.name, Utc::now());
        if !records.is_empty() {
            self.cache()
                .set_json(SEARCH_RESULTS, &identifier, &records)
                .await;
        }
        Ok(records)
    }

    async fn get_details(&self, id: &str) -> Result<Option<ProductRecord>, CatalogError> {
        let Some(url) = self.endpoint.details_url(id) else {
            return Ok(None);
        };
        let identifier = format!("{}:{id}", self.endpoint.name);
        if let Some(cached) = self
            .cache()
            .get_json::<ProductRecord>(PRODUCT_DETAILS, &identifier)
            .await
        {
            return Ok(Some(cached));
        }

        let request = || {
            self.upstream.client.get(&url).query(&[
                ("apiKey", self.endpoint.credential.as_str()),
                ("format", "json"),
                ("show", "all"),
            ])
        };

        let body = match self.upstream.fetch(request, &self.endpoint.name).await {
            Ok(body) => body,
            Err(CatalogError::NotFound(_)) => {
                tracing::debug!(provider = %self.name(), id, "product not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Some deployments wrap single lookups in the search envelope.
        let item = body
            .get("products")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .unwrap_or(&body);
        let record = parse_item(item, &self.endpoint.name, Utc::now())?;
        self.cache().set_json(PRODUCT_DETAILS, &identifier, &record).await;
        Ok(Some(record))
    }
}

/// Normalize every item in a search response, skipping ones that fail.
fn parse_search(body: &Value, source: &str, fetched_at: DateTime<Utc>) -> Vec<ProductRecord> {
    let Some(items) = body.get("products").and_then(Value::as_array) else {
        tracing::warn!(provider = source, "search response has no products array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match parse_item(item, source, fetched_at) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(provider = source, error = %e, "skipping unparseable item");
                None
            }
        })
        .collect()
}

/// Normalize one retail catalog item.
pub(crate) fn parse_item(
    item: &Value,
    source: &str,
    fetched_at: DateTime<Utc>,
) -> Result<ProductRecord, CatalogError> {
    if !item.is_object() {
        return Err(CatalogError::Parse("item is not an object".into()));
    }
    let id = string_field(item, &["sku"])
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::Parse("item has no sku".into()))?;
    let title = string_field(item, &["name"])
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::Parse(format!("item {id} has no name")))?;

    let category = item
        .get("categoryPath")
        .and_then(Value::as_array)
        .and_then(|path| path.last())
        .and_then(|leaf| string_field(leaf, &["name"]))
        .unwrap_or_default();

    Ok(ProductRecord {
        brand: string_field(item, &["manufacturer"]).unwrap_or_default(),
        price: number_field(item, &["regularPrice"])?.unwrap_or(0.0),
        sale_price: number_field(item, &["salePrice"])?.filter(|p| *p > 0.0),
        category,
        description: string_field(item, &["longDescription"]).unwrap_or_default(),
        rating: number_field(item, &["customerReviewAverage"])?.unwrap_or(0.0),
        review_count: number_field(item, &["customerReviewCount"])?
            .map_or(0, |n| n.max(0.0) as u64),
        availability: item
            .get("onlineAvailability")
            .map_or(Availability::Unknown, Availability::from_json),
        images: image_list(item, &["images"], &["image"]),
        specifications: specifications(item.get("details")),
        url: string_field(item, &["url"]).unwrap_or_default(),
        source_id: source.to_string(),
        fetched_at,
        id,
        title,
    })
}

/// `details` arrives either as an object or as `[{"name", "value"}, ...]`.
fn specifications(details: Option<&Value>) -> BTreeMap<String, Value> {
    match details {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(pairs)) => pairs
            .iter()
            .filter_map(|pair| {
                let name = pair.get("name")?.as_str()?.to_string();
                Some((name, pair.get("value").cloned().unwrap_or(Value::Null)))
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_item() -> Value {
        json!({
            "sku": 6_501_234,
            "name": "Acme Pro 15 Laptop",
            "manufacturer": "Acme",
            "regularPrice": 1299.99,
            "salePrice": 1099.99,
            "categoryPath": [{"name": "Computers"}, {"name": "Laptops"}],
            "longDescription": "A laptop.",
            "customerReviewAverage": 4.6,
            "customerReviewCount": 812,
            "onlineAvailability": true,
            "image": "https://img.example/acme.jpg",
            "url": "https://shop.example/acme",
            "details": [{"name": "RAM", "value": "16 GB"}]
        })
    }

    #[test]
    fn parses_full_item() {
        let record = parse_item(&full_item(), "retail", Utc::now()).expect("parse");
        assert_eq!(record.id, "6501234");
        assert_eq!(record.title, "Acme Pro 15 Laptop");
        assert_eq!(record.brand, "Acme");
        assert_eq!(record.sale_price, Some(1099.99));
        assert_eq!(record.category, "Laptops");
        assert_eq!(record.review_count, 812);
        assert_eq!(record.availability, Availability::InStock);
        assert_eq!(record.images, vec!["https://img.example/acme.jpg"]);
        assert_eq!(record.specifications.get("RAM"), Some(&json!("16 GB")));
        assert_eq!(record.source_id, "retail");
    }

    #[test]
    fn missing_optional_fields_default() {
        let record = parse_item(&json!({"sku": "1", "name": "Bare"}), "retail", Utc::now())
            .expect("parse");
        assert_eq!(record.price, 0.0);
        assert_eq!(record.sale_price, None);
        assert_eq!(record.category, "");
        assert_eq!(record.availability, Availability::Unknown);
        assert!(record.images.is_empty());
        assert!(record.specifications.is_empty());
    }

    #[test]
    fn zero_sale_price_is_absent() {
        let item = json!({"sku": "1", "name": "X", "salePrice": 0});
        let record = parse_item(&item, "retail", Utc::now()).expect("parse");
        assert_eq!(record.sale_price, None);
    }

    #[test]
    fn item_without_sku_or_name_is_rejected() {
        assert!(parse_item(&json!({"name": "No sku"}), "retail", Utc::now()).is_err());
        assert!(parse_item(&json!({"sku": "1"}), "retail", Utc::now()).is_err());
        assert!(parse_item(&json!("just a string"), "retail", Utc::now()).is_err());
    }

    #[test]
    fn malformed_item_is_skipped_not_fatal() {
        let body = json!({"products": [
            full_item(),
            {"sku": "2", "name": "Bad price", "regularPrice": "call us"},
            {"sku": "3", "name": "Fine"}
        ]});
        let records = parse_search(&body, "retail", Utc::now());
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["6501234", "3"]);
    }

    #[test]
    fn response_without_products_is_empty() {
        assert!(parse_search(&json!({"error": "x"}), "retail", Utc::now()).is_empty());
    }

    #[test]
    fn details_object_is_kept_as_map() {
        let specs = specifications(Some(&json!({"Color": "Silver"})));
        assert_eq!(specs.get("Color"), Some(&json!("Silver")));
        assert!(specifications(None).is_empty());
    }
}
