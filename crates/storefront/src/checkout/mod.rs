//! Hosted checkout sessions.
//!
//! # Architecture
//!
//! - [`CheckoutProvider`] turns cart line items into a hosted payment page
//! - [`StripeCheckout`] creates real Stripe Checkout sessions
//! - [`DemoCheckout`] answers with a canned session when no Stripe key is
//!   configured
//! - [`CheckoutClient`] calls the storefront's `/create-checkout-session`
//!   endpoint on behalf of a cart
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::checkout::CheckoutClient;
//!
//! let client = CheckoutClient::new(storefront_url);
//! let session = client.checkout(&cart).await?;
//! println!("redirect to {}", session.url);
//! ```

mod client;
mod demo;
mod stripe;

pub use client::CheckoutClient;
pub use demo::DemoCheckout;
pub use stripe::StripeCheckout;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use shopfront_core::{CartLineItem, UserId};

use crate::cart::CartError;

/// Errors that can occur while creating a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The payment provider (or the checkout endpoint) refused the request.
    #[error("Checkout provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The line items cannot be checked out.
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// Clearing the cart after checkout failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id.
    pub id: String,
    /// Hosted page to redirect the customer to.
    #[serde(default)]
    pub url: String,
}

/// Body of `POST /create-checkout-session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartLineItem>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<UserId>,
}

/// Creates hosted checkout sessions.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Create a session for `items` on behalf of `user`.
    ///
    /// Callers validate `items` with [`validate_items`] first.
    async fn create_session(
        &self,
        items: &[CartLineItem],
        user: &UserId,
    ) -> Result<CheckoutSession, CheckoutError>;
}

/// Reject carts that cannot be paid for.
///
/// # Errors
///
/// Returns `CheckoutError::InvalidRequest` for an empty cart or a line with
/// zero quantity.
pub fn validate_items(items: &[CartLineItem]) -> Result<(), CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::InvalidRequest(
            "cart has no items".to_string(),
        ));
    }

    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(CheckoutError::InvalidRequest(format!(
            "item {} has zero quantity",
            item.product_id
        )));
    }

    Ok(())
}

/// The user id to check out as; [`UserId::demo`] when nobody is signed in.
#[must_use]
pub fn checkout_user(user: Option<UserId>) -> UserId {
    user.unwrap_or_else(UserId::demo)
}

/// Page the provider returns to after payment.
///
/// `session_id` is inserted verbatim so provider placeholders such as
/// `{CHECKOUT_SESSION_ID}` survive.
#[must_use]
pub fn success_url(base_url: &Url, session_id: &str, user: &UserId) -> String {
    let user: String = url::form_urlencoded::byte_serialize(user.as_str().as_bytes()).collect();
    format!(
        "{}/success?session_id={session_id}&user_id={user}",
        base_url.as_str().trim_end_matches('/')
    )
}

/// Page the provider returns to when the customer backs out.
#[must_use]
pub fn cancel_url(base_url: &Url) -> String {
    format!("{}/canceled", base_url.as_str().trim_end_matches('/'))
}
