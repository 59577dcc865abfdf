//! In-memory cart document store.
//!
//! Used when no database is configured, and by tests. Documents live for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use shopfront_core::{CartLineItem, CartSnapshot, Revision, UserId};

use super::CartError;
use super::store::{CartStore, CartSubscription, FeedEvent};

/// Process-local [`CartStore`].
///
/// Cheaply cloneable; clones share the same documents and subscribers.
#[derive(Clone, Default)]
pub struct MemoryCartStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    /// `None` items mark a deleted document; its revision is still tracked.
    documents: HashMap<UserId, (Option<Vec<CartLineItem>>, Revision)>,
    subscribers: HashMap<UserId, Vec<mpsc::UnboundedSender<FeedEvent>>>,
    revision: Revision,
    read_only: bool,
}

impl MemoryInner {
    fn snapshot(&self, user: &UserId) -> CartSnapshot {
        match self.documents.get(user) {
            Some((Some(items), revision)) => CartSnapshot::present(items.clone(), *revision),
            Some((None, revision)) => CartSnapshot::missing(*revision),
            None => CartSnapshot::missing(0),
        }
    }

    fn publish(&mut self, user: &UserId) {
        let snapshot = self.snapshot(user);
        if let Some(senders) = self.subscribers.get_mut(user) {
            senders.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }

    fn check_writable(&self) -> Result<(), CartError> {
        if self.read_only {
            return Err(CartError::WriteRejected("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current items of a document, `None` if it does not exist.
    #[must_use]
    pub fn document(&self, user: &UserId) -> Option<Vec<CartLineItem>> {
        let inner = self.lock();
        inner.documents.get(user).and_then(|(items, _)| items.clone())
    }

    /// Number of live subscriptions to a document.
    #[must_use]
    pub fn subscriber_count(&self, user: &UserId) -> usize {
        let mut inner = self.lock();
        inner.subscribers.get_mut(user).map_or(0, |senders| {
            senders.retain(|tx| !tx.is_closed());
            senders.len()
        })
    }

    /// Reject every write while set, as a store would on a permission error.
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, CartError> {
        Ok(self.lock().snapshot(user))
    }

    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, CartError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        // The receiver is alive, so the initial send cannot fail.
        let _ = tx.send(Ok(inner.snapshot(user)));
        inner.subscribers.entry(user.clone()).or_default().push(tx);

        debug!(user = %user, "memory cart subscription attached");
        Ok(CartSubscription::new(rx))
    }

    async fn replace(&self, user: &UserId, items: &[CartLineItem]) -> Result<Revision, CartError> {
        let mut inner = self.lock();
        inner.check_writable()?;

        inner.revision += 1;
        let revision = inner.revision;
        inner
            .documents
            .insert(user.clone(), (Some(items.to_vec()), revision));
        inner.publish(user);

        Ok(revision)
    }

    async fn delete(&self, user: &UserId) -> Result<Revision, CartError> {
        let mut inner = self.lock();
        inner.check_writable()?;

        let exists = matches!(inner.documents.get(user), Some((Some(_), _)));
        if !exists {
            return Ok(inner.snapshot(user).revision);
        }

        inner.revision += 1;
        let revision = inner.revision;
        inner.documents.insert(user.clone(), (None, revision));
        inner.publish(user);

        Ok(revision)
    }
}
