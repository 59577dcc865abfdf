//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! No external services are needed: the catalog API, Stripe and the
//! storefront itself run as in-process axum servers on ephemeral ports.
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart synchronizer against the memory store
//! - `http_cart_store` - Cart synchronizer against a live storefront
//! - `notifications` - Notification lifecycles (paused clock)
//! - `catalog_client` - Catalog client and catalog routes
//! - `checkout_session` - Checkout endpoint, providers and client

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Form, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use url::Url;

use shopfront_core::{Product, ProductId, Rating, UserId};
use shopfront_storefront::config::StorefrontConfig;

// =============================================================================
// Fixtures
// =============================================================================

/// A catalog product priced in cents.
#[must_use]
pub fn product(id: i64, title: &str, price_cents: i64, category: &str) -> Product {
    Product {
        id: ProductId::new(id),
        title: title.to_string(),
        price: Decimal::new(price_cents, 2),
        description: format!("{title} description"),
        category: category.to_string(),
        image: format!("https://fakestoreapi.com/img/{id}.jpg"),
        rating: Rating {
            rate: 4.0,
            count: 10,
        },
    }
}

/// The small catalog most tests run against.
#[must_use]
pub fn catalog() -> Vec<Product> {
    vec![
        product(1, "Fjallraven Backpack", 10995, "men's clothing"),
        product(2, "Slim Fit T-Shirt", 2230, "men's clothing"),
        product(3, "Gold Chain Bracelet", 69500, "jewelery"),
        product(4, "Portable Hard Drive", 6400, "electronics"),
    ]
}

#[must_use]
pub fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

/// Storefront configuration for tests, on top of the built-in defaults.
#[must_use]
pub fn config(vars: &[(&str, &str)]) -> StorefrontConfig {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    StorefrontConfig::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

// =============================================================================
// In-process servers
// =============================================================================

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Fake catalog API answering like the public one: an unknown product id
/// is a `200` with an empty body, `/products/404` is a real 404.
pub struct MockCatalog {
    pub url: Url,
    hits: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct CatalogState {
    products: Arc<Vec<Product>>,
    hits: Arc<AtomicUsize>,
}

impl MockCatalog {
    pub async fn start(products: Vec<Product>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = CatalogState {
            products: Arc::new(products),
            hits: Arc::clone(&hits),
        };

        let router = Router::new()
            .route("/products", get(list_products))
            .route("/products/{id}", get(get_product))
            .with_state(state);

        Self {
            url: serve(router).await,
            hits,
        }
    }

    /// Requests served so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn list_products(State(state): State<CatalogState>) -> Json<Vec<Product>> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    Json(state.products.as_ref().clone())
}

async fn get_product(State(state): State<CatalogState>, Path(id): Path<i64>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if id == 404 {
        return StatusCode::NOT_FOUND.into_response();
    }
    state
        .products
        .iter()
        .find(|p| p.id.get() == id)
        .map_or_else(|| String::new().into_response(), |p| Json(p.clone()).into_response())
}

/// A checkout session request as received by the fake Stripe API.
#[derive(Debug, Clone)]
pub struct StripeCall {
    pub authorization: Option<String>,
    pub form: Vec<(String, String)>,
}

impl StripeCall {
    /// Value of a form field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Fake Stripe API for `POST /v1/checkout/sessions`.
pub struct MockStripe {
    pub url: Url,
    calls: Arc<Mutex<Vec<StripeCall>>>,
}

#[derive(Clone)]
struct StripeState {
    calls: Arc<Mutex<Vec<StripeCall>>>,
    fail: bool,
}

impl MockStripe {
    /// Start a fake that accepts every request, or rejects every request
    /// with Stripe's error envelope when `fail` is set.
    pub async fn start(fail: bool) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = StripeState {
            calls: Arc::clone(&calls),
            fail,
        };

        let router = Router::new()
            .route("/v1/checkout/sessions", post(create_stripe_session))
            .with_state(state);

        Self {
            url: serve(router).await,
            calls,
        }
    }

    /// Requests received so far.
    pub async fn calls(&self) -> Vec<StripeCall> {
        self.calls.lock().await.clone()
    }
}

async fn create_stripe_session(
    State(state): State<StripeState>,
    headers: HeaderMap,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.calls.lock().await.push(StripeCall {
        authorization,
        form,
    });

    if state.fail {
        let body = serde_json::json!({
            "error": { "message": "Invalid API Key provided", "type": "invalid_request_error" }
        });
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    Json(serde_json::json!({
        "id": "cs_test_a1B2c3",
        "object": "checkout.session",
        "url": "https://checkout.stripe.com/c/pay/cs_test_a1B2c3",
    }))
    .into_response()
}
