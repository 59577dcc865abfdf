//! Cart synchronization.
//!
//! # Architecture
//!
//! - [`CartStore`] is the remote per-user document store: a push feed per
//!   document plus whole-document replace
//! - [`CartSynchronizer`] owns the local view of the signed-in user's cart,
//!   mirrors the store's feed into it and writes mutations back
//! - Stores: [`MemoryCartStore`] (process-local), [`PgCartStore`]
//!   (`PostgreSQL` with `LISTEN/NOTIFY`) and [`HttpCartStore`] (the
//!   storefront's `/api/carts` routes)
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::cart::{CartSynchronizer, MemoryCartStore};
//!
//! let cart = CartSynchronizer::new(Arc::new(MemoryCartStore::new()));
//! cart.set_identity(Some(user_id)).await;
//! cart.add_item(&product, 2).await?;
//! assert_eq!(cart.items()[0].quantity, 2);
//! ```

mod http;
mod lines;
mod memory;
mod postgres;
mod store;
mod sync;

pub use http::{CartDocument, CartWriteAck, FEED_ERROR_EVENT, HttpCartStore};
pub use lines::{with_added, with_quantity, without_index};
pub use memory::MemoryCartStore;
pub use postgres::{CART_CHANNEL, PgCartStore};
pub use store::{CartStore, CartSubscription, FeedEvent};
pub use sync::CartSynchronizer;

use thiserror::Error;

/// Errors that can occur while reading, watching or writing a cart document.
#[derive(Debug, Error)]
pub enum CartError {
    /// The push feed could not be attached or broke while attached.
    #[error("Cart subscription failed: {0}")]
    Subscription(String),

    /// The store refused the write (permission, validation, unavailable).
    #[error("Cart write rejected: {0}")]
    WriteRejected(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request to a remote store failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A document or feed event could not be decoded.
    #[error("Malformed cart document: {0}")]
    Malformed(#[from] serde_json::Error),
}
