//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - Readiness check (database, if configured)
//!
//! # Catalog
//! GET    /api/products                - Product listing (?search=&category=&sort=)
//! GET    /api/products/featured       - First products of the catalog (?limit=)
//! GET    /api/products/{id}           - Product detail
//! GET    /api/categories              - Distinct categories
//!
//! # Cart documents
//! GET    /api/carts/{user_id}         - Current document
//! PUT    /api/carts/{user_id}         - Replace document
//! DELETE /api/carts/{user_id}         - Delete document
//! GET    /api/carts/{user_id}/events  - Push feed (server-sent events)
//!
//! # Checkout
//! POST   /create-checkout-session     - Create a hosted checkout session
//! ```

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod health;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{checkout_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::index))
        .route("/products/featured", get(catalog::featured))
        .route("/products/{id}", get(catalog::show))
        .route("/categories", get(catalog::categories))
}

/// Create the cart document routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{user_id}",
            get(carts::show).put(carts::replace).delete(carts::delete),
        )
        .route("/{user_id}/events", get(carts::events))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", catalog_routes())
        .nest("/api/carts", cart_routes())
        .merge(checkout_routes())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/create-checkout-session", post(checkout::create_session))
        .layer(checkout_rate_limiter())
}

/// Build the complete application with its middleware stack.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
