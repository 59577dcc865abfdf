//! Cart document store abstraction.
//!
//! A store holds one cart document per user and pushes every change of a
//! watched document to its subscribers. Writes replace the whole document.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use shopfront_core::{CartLineItem, CartSnapshot, Revision, UserId};

use super::CartError;

/// One event of a push feed.
pub type FeedEvent = Result<CartSnapshot, CartError>;

/// Remote per-user cart document store.
///
/// Implementations must push the current document state as the first event
/// of every subscription, and push again after every accepted write or
/// delete of that document.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Read the current state of the document of `user`.
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, CartError>;

    /// Attach a push feed to the document of `user`.
    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, CartError>;

    /// Replace the whole document of `user` with `items`.
    ///
    /// Returns the revision assigned to the new document state.
    async fn replace(&self, user: &UserId, items: &[CartLineItem]) -> Result<Revision, CartError>;

    /// Delete the document of `user`.
    ///
    /// Returns the revision of the resulting (missing) state.
    async fn delete(&self, user: &UserId) -> Result<Revision, CartError>;
}

/// A live push feed for one cart document.
///
/// Dropping the subscription detaches it from the store. If the feed is
/// driven by a background task, that task is aborted on drop.
pub struct CartSubscription {
    receiver: mpsc::UnboundedReceiver<FeedEvent>,
    task: Option<AbortOnDrop>,
}

impl CartSubscription {
    /// Wrap a channel fed directly by the store.
    #[must_use]
    pub const fn new(receiver: mpsc::UnboundedReceiver<FeedEvent>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// Wrap a channel fed by a background task owned by this subscription.
    #[must_use]
    pub const fn with_task(
        receiver: mpsc::UnboundedReceiver<FeedEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            receiver,
            task: Some(AbortOnDrop(task)),
        }
    }

    /// Wait for the next event. `None` means the store closed the feed.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.receiver.recv().await
    }

    /// Take an already delivered event without waiting.
    pub fn try_next(&mut self) -> Option<FeedEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for CartSubscription {
    type Item = FeedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for CartSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSubscription")
            .field("task", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub(crate) struct AbortOnDrop(pub(crate) JoinHandle<()>);

impl AbortOnDrop {
    pub(crate) fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
