//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS (any origin; the shop front end is served separately)
//! 3. `TraceLayer` (request span with a `request_id` field)
//! 4. Request ID (add unique ID to each request)
//! 5. Rate limiting (governor) on the checkout route only

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::checkout_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
