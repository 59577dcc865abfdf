//! Shopfront storefront library.
//!
//! Cart synchronization, notification queue, catalog and checkout clients,
//! and the HTTP server that hosts cart documents and checkout sessions.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod state;
