//! Catalog product types.
//!
//! Mirrors the catalog API schema:
//!
//! ```json
//! {
//!   "id": 1,
//!   "title": "Fjallraven - Foldsack No. 1 Backpack",
//!   "price": 109.95,
//!   "description": "Your perfect pack for everyday use...",
//!   "category": "men's clothing",
//!   "image": "https://fakestoreapi.com/img/81fPKd-2AYL._AC_SL1500_.jpg",
//!   "rating": { "rate": 3.9, "count": 120 }
//! }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product as published by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: Rating,
}

impl Product {
    /// Unit price in USD.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::usd(self.price)
    }
}

/// Aggregate customer rating.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    /// Average score, 0-5.
    pub rate: f64,
    /// Number of ratings.
    pub count: u32,
}
