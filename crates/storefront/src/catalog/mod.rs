//! Product catalog API client.
//!
//! # Architecture
//!
//! - The catalog API is the source of truth; nothing is stored locally
//! - Responses are cached in memory via `moka` (5 minute TTL)
//! - Filtering and sorting for listings happen in memory, see [`ProductQuery`]
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::catalog::{CatalogClient, ProductQuery, ProductSort};
//!
//! let client = CatalogClient::new(config.catalog_api_url.clone());
//! let products = client.list_products().await?;
//! let query = ProductQuery {
//!     search: Some("backpack".to_string()),
//!     category: None,
//!     sort: ProductSort::Price,
//! };
//! let listing = query.apply(&products);
//! ```

mod query;

pub use query::{ALL_CATEGORIES, ProductQuery, ProductSort, categories, featured};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use shopfront_core::{Product, ProductId};

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Catalog API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The requested product does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Cached catalog responses.
#[derive(Debug, Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for the catalog HTTP API.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<String, CacheValue>,
}

impl CatalogClient {
    /// Create a client for the API at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                client: reqwest::Client::new(),
                base_url,
                cache,
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{path}",
            self.inner.base_url.as_str().trim_end_matches('/')
        )
    }

    /// GET `path` and return the body text, mapping error statuses.
    async fn get_text(&self, path: &str) -> Result<String, CatalogError> {
        let response = self.inner.client.get(self.endpoint(path)).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(path.to_string()));
        }

        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Catalog API returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response cannot be
    /// parsed.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, CatalogError> {
        let cache_key = "products".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let body = self.get_text("products").await?;
        let products: Arc<Vec<Product>> = Arc::new(serde_json::from_str(&body)?);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(Arc::clone(&products)))
            .await;

        debug!(count = products.len(), "Fetched product list");
        Ok(products)
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` on a 404, an empty body or a JSON
    /// `null`, and other errors if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let body = self.get_text(&format!("products/{id}")).await?;
        let product = parse_product(&body)?
            .ok_or_else(|| CatalogError::NotFound(format!("Product not found: {id}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Drop all cached responses.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }
}

/// Parse a single-product body. The API answers an unknown id with an empty
/// body or `null` rather than a 404.
fn parse_product(body: &str) -> Result<Option<Product>, CatalogError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_empty_and_null() {
        assert!(parse_product("").unwrap().is_none());
        assert!(parse_product("  \n").unwrap().is_none());
        assert!(parse_product("null").unwrap().is_none());
    }

    #[test]
    fn test_parse_product_payload() {
        let product = parse_product(r#"{"id":3,"title":"Jacket","price":55.99}"#)
            .unwrap()
            .unwrap();
        assert_eq!(product.id, ProductId::new(3));
        assert!(product.category.is_empty());
    }

    #[test]
    fn test_parse_product_garbage() {
        assert!(matches!(
            parse_product("<html>"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = CatalogClient::new(Url::parse("https://fakestoreapi.com").unwrap());
        assert_eq!(
            client.endpoint("products/1"),
            "https://fakestoreapi.com/products/1"
        );
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Catalog API error (503): unavailable");
    }
}
