//! Cart line items, pushed cart snapshots and cart totals.
//!
//! A cart document holds the ordered line items of one user. Field names on
//! the wire follow the document layout used by the storefront clients
//! (`id`, `title`, `price`, `quantity`, `image`, `category`).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;
use super::product::Product;

/// Sales tax applied to the subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Orders with a subtotal strictly above this ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Flat shipping fee below the free shipping threshold.
pub const FLAT_SHIPPING: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Store-assigned document revision.
///
/// Revisions increase monotonically across every write a store accepts, so a
/// snapshot with a lower revision than one already seen is stale. A document
/// that has never been written has revision 0.
pub type Revision = u64;

/// One product entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub title: String,
    #[serde(
        rename = "price",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(rename = "image", default)]
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CartLineItem {
    /// Build a line item for `quantity` units of a catalog product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            unit_price: product.price,
            quantity,
            image_ref: product.image.clone(),
            category: (!product.category.is_empty()).then(|| product.category.clone()),
        }
    }

    /// Unit price in USD.
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::usd(self.unit_price)
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// State of a cart document as pushed by a store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Whether the document exists at all.
    pub exists: bool,
    /// Line items; empty when the document does not exist.
    pub items: Vec<CartLineItem>,
    /// Revision of this state.
    pub revision: Revision,
}

impl CartSnapshot {
    /// Snapshot of a document that does not exist.
    #[must_use]
    pub const fn missing(revision: Revision) -> Self {
        Self {
            exists: false,
            items: Vec::new(),
            revision,
        }
    }

    /// Snapshot of an existing document.
    #[must_use]
    pub const fn present(items: Vec<CartLineItem>, revision: Revision) -> Self {
        Self {
            exists: true,
            items,
            revision,
        }
    }

    /// The items a local view should show for this snapshot.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        if self.exists { self.items } else { Vec::new() }
    }
}

/// Order summary amounts for a set of line items.
///
/// All amounts are rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    /// Compute totals for the given items.
    ///
    /// Tax is 8% of the subtotal. Shipping is a flat $10 unless the subtotal
    /// exceeds $100; an empty cart has no shipping.
    #[must_use]
    pub fn for_items(items: &[CartLineItem]) -> Self {
        let subtotal: Decimal = items.iter().map(CartLineItem::line_total).sum();
        let tax = round_cents(subtotal * TAX_RATE);
        let shipping = if items.is_empty() || subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING
        };
        let subtotal = round_cents(subtotal);

        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

/// Total number of units across all line items (navigation badge count).
#[must_use]
pub fn item_count(items: &[CartLineItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
