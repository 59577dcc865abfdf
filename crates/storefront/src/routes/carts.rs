//! Cart document route handlers.
//!
//! Serve the configured [`CartStore`](crate::cart::CartStore) over HTTP so
//! remote clients ([`HttpCartStore`](crate::cart::HttpCartStore)) can read,
//! replace and watch a user's cart document.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use tokio_stream::Stream;
use tracing::{debug, instrument};

use shopfront_core::{CartSnapshot, UserId};

use crate::cart::{CartDocument, CartSubscription, CartWriteAck, FEED_ERROR_EVENT};
use crate::error::{AppError, Result};
use crate::state::AppState;

fn parse_user(raw: &str) -> Result<UserId> {
    UserId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Current document.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CartSnapshot>> {
    let user = parse_user(&user_id)?;
    Ok(Json(state.carts().fetch(&user).await?))
}

/// Replace the whole document.
#[instrument(skip(state, document))]
pub async fn replace(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(document): Json<CartDocument>,
) -> Result<Json<CartWriteAck>> {
    let user = parse_user(&user_id)?;
    let revision = state.carts().replace(&user, &document.items).await?;
    Ok(Json(CartWriteAck { revision }))
}

/// Delete the document.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CartWriteAck>> {
    let user = parse_user(&user_id)?;
    let revision = state.carts().delete(&user).await?;
    Ok(Json(CartWriteAck { revision }))
}

/// Push feed of the document as server-sent events.
#[instrument(skip(state))]
pub async fn events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Sse<KeepAliveStream<SnapshotEvents>>> {
    let user = parse_user(&user_id)?;
    let subscription = state.carts().subscribe(&user).await?;
    debug!(user = %user, "Cart feed opened");

    Ok(Sse::new(SnapshotEvents::new(subscription)).keep_alive(KeepAlive::default()))
}

/// SSE stream over a cart subscription.
///
/// Each snapshot becomes one `data:` event. A feed error is sent once as an
/// `error` event and ends the stream. The subscription is released when the
/// client disconnects.
pub struct SnapshotEvents {
    subscription: CartSubscription,
    done: bool,
}

impl SnapshotEvents {
    const fn new(subscription: CartSubscription) -> Self {
        Self {
            subscription,
            done: false,
        }
    }
}

fn error_event(message: impl AsRef<str>) -> Event {
    Event::default().event(FEED_ERROR_EVENT).data(message.as_ref())
}

impl Stream for SnapshotEvents {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let event = match Pin::new(&mut this.subscription).poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Poll::Ready(Some(Ok(snapshot))) => Event::default()
                .json_data(&snapshot)
                .unwrap_or_else(|e| {
                    this.done = true;
                    error_event(e.to_string())
                }),
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                error_event(e.to_string())
            }
        };

        Poll::Ready(Some(Ok(event)))
    }
}
