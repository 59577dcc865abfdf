//! Demo checkout provider used when no payment provider is configured.

use async_trait::async_trait;
use tracing::info;
use url::Url;

use shopfront_core::{CartLineItem, UserId};

use super::{CheckoutError, CheckoutProvider, CheckoutSession, success_url};

/// Answers every request with a `cs_demo_<unix millis>` session that
/// redirects straight to the success page. No payment is taken.
#[derive(Debug, Clone)]
pub struct DemoCheckout {
    base_url: Url,
}

impl DemoCheckout {
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl CheckoutProvider for DemoCheckout {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn create_session(
        &self,
        items: &[CartLineItem],
        user: &UserId,
    ) -> Result<CheckoutSession, CheckoutError> {
        let millis = chrono::Utc::now().timestamp_millis();

        let session = CheckoutSession {
            id: format!("cs_demo_{millis}"),
            url: success_url(&self.base_url, "demo_session", user),
        };

        info!(user = %user, lines = items.len(), session_id = %session.id, "Demo checkout session created");
        Ok(session)
    }
}
