//! Cart document store reached over the storefront's HTTP API.
//!
//! # Routes
//!
//! - `GET /api/carts/{user_id}` - current [`CartSnapshot`]
//! - `PUT /api/carts/{user_id}` - replace with a [`CartDocument`], answers [`CartWriteAck`]
//! - `DELETE /api/carts/{user_id}` - delete, answers [`CartWriteAck`]
//! - `GET /api/carts/{user_id}/events` - server-sent events, one
//!   [`CartSnapshot`] per `data:` frame, an `error` event before the server
//!   gives up on the feed

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, instrument, warn};
use url::Url;

use shopfront_core::{CartLineItem, CartSnapshot, Revision, UserId};

use super::CartError;
use super::store::{CartStore, CartSubscription, FeedEvent};

/// Request body of a whole-document replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDocument {
    pub items: Vec<CartLineItem>,
}

/// Response body of an accepted write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartWriteAck {
    pub revision: Revision,
}

/// Name of the SSE event that carries a feed failure.
pub const FEED_ERROR_EVENT: &str = "error";

/// [`CartStore`] client for a remote storefront.
#[derive(Clone)]
pub struct HttpCartStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartStore {
    /// Create a client for the storefront at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn document_url(&self, user: &UserId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "carts", user.as_str()]);
        }
        url
    }

    fn events_url(&self, user: &UserId) -> Url {
        let mut url = self.document_url(user);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("events");
        }
        url
    }

    async fn write(response: reqwest::Response) -> Result<Revision, CartError> {
        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(CartError::WriteRejected(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let ack: CartWriteAck = response.error_for_status()?.json().await?;
        Ok(ack.revision)
    }
}

#[async_trait]
impl CartStore for HttpCartStore {
    #[instrument(skip(self), fields(user = %user))]
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, CartError> {
        let snapshot = self
            .client
            .get(self.document_url(user))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, CartError> {
        let response = self
            .client
            .get(self.events_url(user))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| CartError::Subscription(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CartError::Subscription(format!(
                "feed answered HTTP {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let user = user.clone();
        let task = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(CartError::Subscription(e.to_string())));
                        return;
                    }
                };

                let frames = match parser.push(&chunk) {
                    Ok(frames) => frames,
                    Err(e) => {
                        warn!(user = %user, error = %e, "cart feed dropped");
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                for frame in frames {
                    let event = frame.into_feed_event();
                    let failed = event.is_err();
                    if tx.send(event).is_err() || failed {
                        return;
                    }
                }
            }

            warn!(user = %user, "cart feed ended");
            let _ = tx.send(Err(CartError::Subscription("feed ended".to_string())));
        });

        debug!("http cart subscription attached");
        Ok(CartSubscription::with_task(rx, task))
    }

    #[instrument(skip(self, items), fields(user = %user, lines = items.len()))]
    async fn replace(&self, user: &UserId, items: &[CartLineItem]) -> Result<Revision, CartError> {
        let body = CartDocument {
            items: items.to_vec(),
        };
        let response = self
            .client
            .put(self.document_url(user))
            .json(&body)
            .send()
            .await?;
        Self::write(response).await
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn delete(&self, user: &UserId) -> Result<Revision, CartError> {
        let response = self.client.delete(self.document_url(user)).send().await?;
        Self::write(response).await
    }
}

// =============================================================================
// Server-sent events
// =============================================================================

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

impl SseFrame {
    fn into_feed_event(self) -> FeedEvent {
        if self.event.as_deref() == Some(FEED_ERROR_EVENT) {
            return Err(CartError::Subscription(self.data));
        }
        Ok(serde_json::from_str(&self.data)?)
    }
}

/// Largest event the feed parser buffers while waiting for its terminating
/// blank line. Cart documents are far smaller.
const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` parser.
///
/// Only the `event` and `data` fields are kept. Frames without data (comments,
/// keep-alives) are not dispatched.
#[derive(Debug)]
struct SseParser {
    buffer: Vec<u8>,
    max_frame: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl SseParser {
    const fn with_limit(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame,
        }
    }

    /// Feed raw body bytes. Chunks may split lines or UTF-8 sequences.
    ///
    /// Fails once an unterminated event grows past the frame limit.
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, CartError> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = Self::parse_frame(&String::from_utf8_lossy(&raw)) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_frame {
            self.buffer.clear();
            return Err(CartError::Subscription(format!(
                "feed event exceeds {} bytes",
                self.max_frame
            )));
        }
        Ok(frames)
    }

    fn parse_frame(raw: &str) -> Option<SseFrame> {
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in raw.lines() {
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event = Some(value.to_string()),
                "data" => data.push(value),
                _ => {}
            }
        }

        if data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: data.join("\n"),
        })
    }
}
