//! Stripe Checkout provider.
//!
//! Creates sessions through `POST /v1/checkout/sessions` with a
//! form-encoded body, one `line_items[i]` group per cart line.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use shopfront_core::{CartLineItem, UserId};

use super::{CheckoutError, CheckoutProvider, CheckoutSession, cancel_url, success_url};
use crate::config::StripeConfig;

/// Placeholder Stripe replaces with the session id in the success URL.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Stripe error envelope: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

/// [`CheckoutProvider`] backed by Stripe Checkout.
pub struct StripeCheckout {
    client: reqwest::Client,
    endpoint: String,
    secret_key: SecretString,
    base_url: Url,
}

impl StripeCheckout {
    /// Create a provider; `base_url` is the public storefront used for the
    /// success and cancel pages.
    #[must_use]
    pub fn new(config: &StripeConfig, base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/v1/checkout/sessions",
                config.api_url.as_str().trim_end_matches('/')
            ),
            secret_key: config.secret_key.clone(),
            base_url,
        }
    }
}

/// Build the form fields of a session request.
///
/// # Errors
///
/// Returns `CheckoutError::InvalidRequest` if a unit price cannot be
/// expressed in cents.
fn session_form(
    items: &[CartLineItem],
    user: &UserId,
    base_url: &Url,
) -> Result<Vec<(String, String)>, CheckoutError> {
    let mut form = vec![
        ("payment_method_types[]".to_string(), "card".to_string()),
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            success_url(base_url, SESSION_ID_PLACEHOLDER, user),
        ),
        ("cancel_url".to_string(), cancel_url(base_url)),
    ];

    for (i, item) in items.iter().enumerate() {
        let price = item.price();
        let unit_amount = price
            .to_minor_units()
            .map_err(|e| CheckoutError::InvalidRequest(e.to_string()))?;
        let prefix = format!("line_items[{i}]");

        form.push((
            format!("{prefix}[price_data][currency]"),
            price.currency_code.provider_code().to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.title.clone(),
        ));
        if !item.image_ref.is_empty() {
            form.push((
                format!("{prefix}[price_data][product_data][images][]"),
                item.image_ref.clone(),
            ));
        }
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    Ok(form)
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    fn name(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, items), fields(user = %user, lines = items.len()))]
    async fn create_session(
        &self,
        items: &[CartLineItem],
        user: &UserId,
    ) -> Result<CheckoutSession, CheckoutError> {
        let form = session_form(items, user, &self.base_url)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body).map_or_else(
                |_| body.chars().take(200).collect(),
                |e| e.error.message,
            );
            tracing::error!(status = %status, message = %message, "Stripe rejected checkout session");
            return Err(CheckoutError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = serde_json::from_str(&body)?;
        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }
}
