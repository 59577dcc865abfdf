//! Catalog client and catalog route tests against a fake catalog API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use shopfront_core::{Product, ProductId};
use shopfront_integration_tests::{MockCatalog, catalog, config};
use shopfront_storefront::catalog::{CatalogClient, CatalogError};
use shopfront_storefront::routes::app;
use shopfront_storefront::state::AppState;

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn router(mock: &MockCatalog) -> axum::Router {
    let config = config(&[("CATALOG_API_URL", mock.url.as_str())]);
    app(AppState::new(config, None))
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_list_products_is_cached() {
    let mock = MockCatalog::start(catalog()).await;
    let client = CatalogClient::new(mock.url.clone());

    let first = client.list_products().await.unwrap();
    let second = client.list_products().await.unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
    assert_eq!(mock.hits(), 1);

    client.invalidate_all();
    client.list_products().await.unwrap();
    assert_eq!(mock.hits(), 2);
}

#[tokio::test]
async fn test_get_product() {
    let mock = MockCatalog::start(catalog()).await;
    let client = CatalogClient::new(mock.url.clone());

    let product = client.get_product(ProductId::new(3)).await.unwrap();
    assert_eq!(product.title, "Gold Chain Bracelet");
    assert_eq!(product.category, "jewelery");

    client.get_product(ProductId::new(3)).await.unwrap();
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let mock = MockCatalog::start(catalog()).await;
    let client = CatalogClient::new(mock.url.clone());

    // Empty 200 body.
    let err = client.get_product(ProductId::new(99)).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    // Real 404.
    let err = client.get_product(ProductId::new(404)).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[tokio::test]
async fn test_unreachable_catalog_is_http_error() {
    let client = CatalogClient::new("http://127.0.0.1:9".parse().unwrap());
    let err = client.list_products().await.unwrap_err();
    assert!(matches!(err, CatalogError::Http(_)));
}

// =============================================================================
// Routes
// =============================================================================

#[tokio::test]
async fn test_products_route_filters_and_sorts() {
    let mock = MockCatalog::start(catalog()).await;

    let (status, body) = get_json(
        router(&mock),
        "/api/products?category=men%27s%20clothing&sort=price",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<Product> = serde_json::from_value(body).unwrap();
    let titles: Vec<_> = products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Slim Fit T-Shirt", "Fjallraven Backpack"]);

    let (_, body) = get_json(router(&mock), "/api/products?search=%20DRIVE%20").await;
    let products: Vec<Product> = serde_json::from_value(body).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, ProductId::new(4));

    let (_, body) = get_json(router(&mock), "/api/products?category=all").await;
    assert_eq!(body.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_categories_and_featured_routes() {
    let mock = MockCatalog::start(catalog()).await;

    let (_, body) = get_json(router(&mock), "/api/categories").await;
    assert_eq!(
        body,
        serde_json::json!(["men's clothing", "jewelery", "electronics"])
    );

    let (_, body) = get_json(router(&mock), "/api/products/featured").await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = get_json(router(&mock), "/api/products/featured?limit=1").await;
    assert_eq!(body[0]["title"], "Fjallraven Backpack");
}

#[tokio::test]
async fn test_product_route_not_found() {
    let mock = MockCatalog::start(catalog()).await;

    let (status, body) = get_json(router(&mock), "/api/products/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found");

    let (status, body) = get_json(router(&mock), "/api/products/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Slim Fit T-Shirt");
}

#[tokio::test]
async fn test_catalog_outage_is_bad_gateway() {
    let config = config(&[("CATALOG_API_URL", "http://127.0.0.1:9")]);
    let (status, body) = get_json(app(AppState::new(config, None)), "/api/products").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "External service error");
}
