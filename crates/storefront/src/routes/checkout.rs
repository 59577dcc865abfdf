//! Checkout session handler.

use axum::{Json, extract::State};
use tracing::{info, instrument};

use crate::checkout::{CheckoutRequest, CheckoutSession, checkout_user, validate_items};
use crate::error::{Result, add_breadcrumb};
use crate::state::AppState;

/// Create a hosted checkout session for the posted line items.
///
/// Answers `{ id, url }`, or `{ error }` with 400 for an empty cart or a
/// zero quantity and 500 when the provider fails.
#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    validate_items(&request.items)?;

    let user = checkout_user(request.user_id);
    let session = state
        .checkout()
        .create_session(&request.items, &user)
        .await?;

    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("session_id", session.id.as_str()), ("user_id", user.as_str())]),
    );
    info!(
        session_id = %session.id,
        user = %user,
        lines = request.items.len(),
        provider = state.checkout().name(),
        "Checkout session created"
    );

    Ok(Json(session))
}
