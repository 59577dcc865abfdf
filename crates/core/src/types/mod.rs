//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod status;
pub mod user;

pub use cart::{CartLineItem, CartSnapshot, CartTotals, Revision, item_count};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{Product, Rating};
pub use status::*;
pub use user::{UserId, UserIdError};
