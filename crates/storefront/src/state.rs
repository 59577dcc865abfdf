//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cart::{CartStore, MemoryCartStore, PgCartStore};
use crate::catalog::CatalogClient;
use crate::checkout::{CheckoutProvider, DemoCheckout, StripeCheckout};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the cart store, API clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    catalog: CatalogClient,
    checkout: Arc<dyn CheckoutProvider>,
    carts: Arc<dyn CartStore>,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// With a pool, carts are stored in `PostgreSQL`; without one they live in
    /// memory. With a Stripe key, checkout goes through Stripe; without one it
    /// runs in demo mode.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: Option<PgPool>) -> Self {
        let carts: Arc<dyn CartStore> = match &pool {
            Some(pool) => Arc::new(PgCartStore::new(pool.clone())),
            None => Arc::new(MemoryCartStore::new()),
        };
        let checkout: Arc<dyn CheckoutProvider> = match &config.stripe {
            Some(stripe) => Arc::new(StripeCheckout::new(stripe, config.base_url.clone())),
            None => Arc::new(DemoCheckout::new(config.base_url.clone())),
        };
        let catalog = CatalogClient::new(config.catalog_api_url.clone());

        Self::from_parts(config, pool, catalog, checkout, carts)
    }

    /// Assemble state from explicit components.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        catalog: CatalogClient,
        checkout: Arc<dyn CheckoutProvider>,
        carts: Arc<dyn CartStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                checkout,
                carts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the database connection pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the catalog API client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get the checkout provider.
    #[must_use]
    pub fn checkout(&self) -> &dyn CheckoutProvider {
        self.inner.checkout.as_ref()
    }

    /// Get the cart document store.
    #[must_use]
    pub fn carts(&self) -> &dyn CartStore {
        self.inner.carts.as_ref()
    }
}
