//! Client for the storefront's checkout session endpoint.

use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

use shopfront_core::{CartLineItem, UserId};

use super::{CheckoutError, CheckoutRequest, CheckoutSession, checkout_user};
use crate::cart::CartSynchronizer;

/// Error body answered by `/create-checkout-session`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Calls `POST /create-checkout-session` on a storefront server.
#[derive(Clone)]
pub struct CheckoutClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CheckoutClient {
    /// Create a client for the storefront at `server_url`.
    #[must_use]
    pub fn new(server_url: &Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/create-checkout-session",
                server_url.as_str().trim_end_matches('/')
            ),
        }
    }

    /// Request a checkout session for `items`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Provider` with the server's status and error
    /// message if the server refuses, or `CheckoutError::Http` if the request
    /// fails.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn create_session(
        &self,
        items: &[CartLineItem],
        user: Option<&UserId>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let body = CheckoutRequest {
            items: items.to_vec(),
            user_id: user.cloned(),
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |e| e.error);
            return Err(CheckoutError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Check out the current contents of `cart`, then clear it.
    ///
    /// Without a signed-in user the session is created for the demo user and
    /// the clear is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidRequest` for an empty cart, any error
    /// of [`CheckoutClient::create_session`], or `CheckoutError::Cart` if the
    /// cart could not be cleared afterwards. The cart is left untouched when
    /// session creation fails.
    #[instrument(skip(self, cart))]
    pub async fn checkout(&self, cart: &CartSynchronizer) -> Result<CheckoutSession, CheckoutError> {
        let items = cart.items();
        if items.is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "cart has no items".to_string(),
            ));
        }

        let user = checkout_user(cart.identity());
        let session = self.create_session(&items, Some(&user)).await?;
        info!(session_id = %session.id, user = %user, "Checkout session created");

        cart.clear().await?;
        Ok(session)
    }
}
