//! Shopfront Core - Shared types library.
//!
//! This crate provides common types used across all Shopfront components:
//! - `storefront` - Cart synchronization, notifications, catalog and checkout
//! - `integration-tests` - Cross-crate tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, products, cart line items and
//!   notification states

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
