//! Checkout endpoint, checkout providers and the checkout client.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use shopfront_core::CartLineItem;
use shopfront_integration_tests::{MockStripe, config, product, serve, user};
use shopfront_storefront::cart::{CartSynchronizer, MemoryCartStore};
use shopfront_storefront::checkout::{CheckoutClient, CheckoutError};
use shopfront_storefront::routes::app;
use shopfront_storefront::state::AppState;

const STRIPE_KEY: &str = "sk_test_51Hq7WbK2mN8pR4vT9xY3zA6cD0fG";

fn demo_app() -> Router {
    app(AppState::new(config(&[]), None))
}

fn stripe_app(stripe: &MockStripe) -> Router {
    let config = config(&[
        ("STRIPE_SECRET_KEY", STRIPE_KEY),
        ("STRIPE_API_URL", stripe.url.as_str()),
        ("SHOPFRONT_BASE_URL", "https://shop.example.com"),
    ]);
    app(AppState::new(config, None))
}

fn line(quantity: u32) -> CartLineItem {
    CartLineItem::from_product(&product(1, "Fjallraven Backpack", 10995, "bags"), quantity)
}

async fn post_session(router: Router, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/create-checkout-session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

// =============================================================================
// Endpoint
// =============================================================================

#[tokio::test]
async fn test_empty_items_rejected() {
    let (status, body) = post_session(demo_app(), &json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_zero_quantity_rejected() {
    let body = json!({ "items": [line(0)] });
    let (status, _) = post_session(demo_app(), &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_demo_session_without_provider() {
    let body = json!({ "items": [line(2)] });
    let (status, body) = post_session(demo_app(), &body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].as_str().unwrap().starts_with("cs_demo_"));
    assert!(
        body["url"]
            .as_str()
            .unwrap()
            .ends_with("/success?session_id=demo_session&user_id=demo_user")
    );
}

#[tokio::test]
async fn test_stripe_session_request() {
    let stripe = MockStripe::start(false).await;
    let body = json!({ "items": [line(2)], "userId": "alice" });

    let (status, body) = post_session(stripe_app(&stripe), &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "cs_test_a1B2c3");
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_a1B2c3");

    let calls = stripe.calls().await;
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(
        call.authorization.as_deref(),
        Some(format!("Bearer {STRIPE_KEY}").as_str())
    );
    assert_eq!(call.field("mode"), Some("payment"));
    assert_eq!(call.field("payment_method_types[]"), Some("card"));
    assert_eq!(
        call.field("success_url"),
        Some("https://shop.example.com/success?session_id={CHECKOUT_SESSION_ID}&user_id=alice")
    );
    assert_eq!(
        call.field("cancel_url"),
        Some("https://shop.example.com/canceled")
    );
    assert_eq!(call.field("line_items[0][price_data][currency]"), Some("usd"));
    assert_eq!(
        call.field("line_items[0][price_data][product_data][name]"),
        Some("Fjallraven Backpack")
    );
    assert_eq!(call.field("line_items[0][price_data][unit_amount]"), Some("10995"));
    assert_eq!(call.field("line_items[0][quantity]"), Some("2"));
}

#[tokio::test]
async fn test_stripe_error_message_is_returned() {
    let stripe = MockStripe::start(true).await;
    let body = json!({ "items": [line(1)] });

    let (status, body) = post_session(stripe_app(&stripe), &body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid API Key provided");
}

#[tokio::test]
async fn test_checkout_is_rate_limited() {
    let router = demo_app();
    let body = json!({ "items": [] });

    for _ in 0..5 {
        let (status, _) = post_session(router.clone(), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = post_session(router, &body).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_checkout_clears_cart() {
    let server = serve(demo_app()).await;
    let client = CheckoutClient::new(&server);

    let store = Arc::new(MemoryCartStore::new());
    let alice = user("alice");
    let cart = CartSynchronizer::new(store.clone());
    cart.set_identity(Some(alice.clone())).await;
    cart.add_item(&product(1, "Fjallraven Backpack", 10995, "bags"), 1)
        .await
        .unwrap();

    let session = client.checkout(&cart).await.unwrap();

    assert!(session.id.starts_with("cs_demo_"));
    assert!(session.url.ends_with("user_id=alice"));
    assert!(cart.items().is_empty());
    assert_eq!(store.document(&alice), Some(Vec::new()));
}

#[tokio::test]
async fn test_checkout_of_empty_cart() {
    let client = CheckoutClient::new(&"http://127.0.0.1:9".parse().unwrap());
    let cart = CartSynchronizer::new(Arc::new(MemoryCartStore::new()));

    let err = client.checkout(&cart).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_failed_checkout_keeps_cart() {
    let stripe = MockStripe::start(true).await;
    let server = serve(stripe_app(&stripe)).await;
    let client = CheckoutClient::new(&server);

    let cart = CartSynchronizer::new(Arc::new(MemoryCartStore::new()));
    cart.set_identity(Some(user("alice"))).await;
    cart.add_item(&product(2, "Slim Fit T-Shirt", 2230, "clothing"), 3)
        .await
        .unwrap();

    let err = client.checkout(&cart).await.unwrap_err();

    match err {
        CheckoutError::Provider { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Invalid API Key provided");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cart.item_count(), 3);
}
