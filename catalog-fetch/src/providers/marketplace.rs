//! Marketplace aggregator provider (fallback source).
//!
//! Fans a search out to an ordered list of sub-endpoints, each asked for an
//! equal share of the limit. Sub-endpoints that fail are skipped; the rest
//! are concatenated in configured order.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;

use super::{Upstream, field, image_list, normalize_query, number_field, string_field};
use crate::cache::TieredCache;
use crate::config::{ProviderConfig, ProviderDescriptor};
use crate::error::CatalogError;
use crate::provider::CatalogProvider;
use crate::types::{Availability, PRODUCT_DETAILS, ProductRecord, SEARCH_RESULTS};

/// Envelope keys that may hold the item array, in lookup order.
const ITEM_KEYS: &[&str] = &["results", "products", "items"];

/// Client for a set of marketplace sub-endpoints sharing one credential
/// and one rate limiter.
pub struct MarketplaceProvider {
    upstream: Upstream,
}

impl MarketplaceProvider {
    /// # Errors
    ///
    /// Returns [`CatalogError::Config`] if `config` does not validate or the
    /// HTTP client cannot be built.
    pub fn new(config: ProviderConfig, cache: Arc<TieredCache>) -> Result<Self, CatalogError> {
        Ok(Self {
            upstream: Upstream::new(config, cache)?,
        })
    }

    fn endpoints(&self) -> &[ProviderDescriptor] {
        &self.upstream.config.endpoints
    }

    fn request(&self, endpoint: &ProviderDescriptor, url: &str) -> reqwest::RequestBuilder {
        self.upstream
            .client
            .get(url)
            .header("X-RapidAPI-Key", &endpoint.credential)
            .header("X-RapidAPI-Host", endpoint.host())
    }

    /// Search one sub-endpoint, serving from cache when possible.
    async fn search_endpoint(
        &self,
        endpoint: &ProviderDescriptor,
        query: &str,
        share: usize,
    ) -> Result<Vec<ProductRecord>, CatalogError> {
        let identifier = format!("{}:{}:{share}", endpoint.name, normalize_query(query));
        if let Some(cached) = self
            .upstream
            .cache
            .get_json::<Vec<ProductRecord>>(SEARCH_RESULTS, &identifier)
            .await
        {
            return Ok(cached);
        }

        let url = endpoint.search_url();
        let share_param = share.to_string();
        let request = || {
            self.request(endpoint, &url)
                .query(&[("query", query), ("limit", share_param.as_str())])
        };
        let body = self.upstream.fetch(request, &endpoint.name).await?;

        let records = parse_search(&body, &endpoint.name, Utc::now());
        if !records.is_empty() {
            self.upstream
                .cache
                .set_json(SEARCH_RESULTS, &identifier, &records)
                .await;
        }
        Ok(records)
    }

    /// Look `id` up on one sub-endpoint. `Ok(None)` on 404.
    async fn details_endpoint(
        &self,
        endpoint: &ProviderDescriptor,
        url: &str,
        id: &str,
    ) -> Result<Option<ProductRecord>, CatalogError> {
        let identifier = format!("{}:{id}", endpoint.name);
        if let Some(cached) = self
            .upstream
            .cache
            .get_json::<ProductRecord>(PRODUCT_DETAILS, &identifier)
            .await
        {
            return Ok(Some(cached));
        }

        let body = match self
            .upstream
            .fetch(|| self.request(endpoint, url), &endpoint.name)
            .await
        {
            Ok(body) => body,
            Err(CatalogError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let item = items(&body)
            .and_then(|items| items.first())
            .unwrap_or(&body);
        let record = parse_item(item, &endpoint.name, Utc::now())?;
        self.upstream
            .cache
            .set_json(PRODUCT_DETAILS, &identifier, &record)
            .await;
        Ok(Some(record))
    }
}

#[async_trait]
impl CatalogProvider for MarketplaceProvider {
    fn name(&self) -> &str {
        &self.upstream.config.name
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, CatalogError> {
        let endpoints = self.endpoints();
        if endpoints.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let share = (limit / endpoints.len()).max(1);
        tracing::trace!(provider = %self.name(), query, share, "marketplace search");

        let futures = endpoints
            .iter()
            .map(|endpoint| self.search_endpoint(endpoint, query, share));
        let outcomes = join_all(futures).await;

        let mut records = Vec::new();
        for (endpoint, outcome) in endpoints.iter().zip(outcomes) {
            match outcome {
                Ok(batch) => {
                    tracing::debug!(
                        endpoint = %endpoint.name,
                        count = batch.len(),
                        "sub-endpoint returned"
                    );
                    records.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        error = %e,
                        "sub-endpoint failed, skipping"
                    );
                }
            }
        }
        records.truncate(limit);
        Ok(records)
    }

    async fn get_details(&self, id: &str) -> Result<Option<ProductRecord>, CatalogError> {
        let mut last_error = None;
        for endpoint in self.endpoints() {
            let Some(url) = endpoint.details_url(id) else {
                continue;
            };
            match self.details_endpoint(endpoint, &url, id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint.name, error = %e, "details lookup failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

fn items(body: &Value) -> Option<&Vec<Value>> {
    ITEM_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
}

fn parse_search(body: &Value, source: &str, fetched_at: DateTime<Utc>) -> Vec<ProductRecord> {
    let Some(items) = items(body) else {
        tracing::warn!(endpoint = source, "response has no results, products or items array");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match parse_item(item, source, fetched_at) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(endpoint = source, error = %e, "skipping unparseable item");
                None
            }
        })
        .collect()
}

/// Normalize one marketplace item, trying each field's aliases in turn.
pub(crate) fn parse_item(
    item: &Value,
    source: &str,
    fetched_at: DateTime<Utc>,
) -> Result<ProductRecord, CatalogError> {
    if !item.is_object() {
        return Err(CatalogError::Parse("item is not an object".into()));
    }
    let id = string_field(item, &["id", "asin", "sku"])
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::Parse("item has no id, asin or sku".into()))?;
    let title = string_field(item, &["title", "name"])
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CatalogError::Parse(format!("item {id} has no title")))?;

    let specifications = match field(item, &["specifications"]) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => BTreeMap::new(),
    };

    Ok(ProductRecord {
        brand: string_field(item, &["brand", "manufacturer"]).unwrap_or_default(),
        price: number_field(item, &["price", "regularPrice"])?.unwrap_or(0.0),
        sale_price: number_field(item, &["salePrice"])?.filter(|p| *p > 0.0),
        category: string_field(item, &["category"]).unwrap_or_default(),
        description: string_field(item, &["description"]).unwrap_or_default(),
        rating: number_field(item, &["rating", "averageRating"])?.unwrap_or(0.0),
        review_count: number_field(item, &["reviewCount", "ratingsTotal"])?
            .map_or(0, |n| n.max(0.0) as u64),
        availability: field(item, &["availability"])
            .map_or(Availability::Unknown, Availability::from_json),
        images: image_list(item, &["images"], &["image"]),
        specifications,
        url: string_field(item, &["url"]).unwrap_or_default(),
        source_id: source.to_string(),
        fetched_at,
        id,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_alias_fields() {
        let item = json!({
            "asin": "B0ACME15",
            "name": "Acme Pro 15",
            "manufacturer": "Acme",
            "regularPrice": "999.00",
            "averageRating": 4.4,
            "ratingsTotal": 1500,
            "image": "https://img.example/a.jpg",
            "availability": "In Stock"
        });
        let record = parse_item(&item, "amazon", Utc::now()).expect("parse");
        assert_eq!(record.id, "B0ACME15");
        assert_eq!(record.title, "Acme Pro 15");
        assert_eq!(record.brand, "Acme");
        assert_eq!(record.price, 999.0);
        assert_eq!(record.review_count, 1500);
        assert_eq!(record.images, vec!["https://img.example/a.jpg"]);
        assert_eq!(record.availability, Availability::InStock);
        assert_eq!(record.source_id, "amazon");
    }

    #[test]
    fn primary_alias_wins_over_secondary() {
        let item = json!({
            "id": "1", "sku": "2", "title": "T", "name": "N", "price": 5, "regularPrice": 9
        });
        let record = parse_item(&item, "walmart", Utc::now()).expect("parse");
        assert_eq!(record.id, "1");
        assert_eq!(record.title, "T");
        assert_eq!(record.price, 5.0);
    }

    #[test]
    fn items_found_under_any_envelope_key() {
        for key in ITEM_KEYS {
            let body = json!({ *key: [{"id": "1", "title": "T"}] });
            assert_eq!(parse_search(&body, "target", Utc::now()).len(), 1, "key {key}");
        }
        assert!(parse_search(&json!({"data": []}), "target", Utc::now()).is_empty());
    }

    #[test]
    fn bad_item_is_skipped() {
        let body = json!({"results": [
            {"id": "1", "title": "Good"},
            {"id": "2", "title": "Bad rating", "rating": {"stars": 4}},
            {"title": "No id"}
        ]});
        let records = parse_search(&body, "walmart", Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }
}
