//! Local cart view kept in step with a remote cart document.
//!
//! The synchronizer follows an injected identity. While a user is signed in
//! it holds a push feed on that user's document and replaces its local items
//! with every pushed snapshot. Mutations read the local items, compute the
//! next full sequence and replace the remote document with it.
//!
//! Mutations on one synchronizer are serialized with each other and with
//! identity changes, and never run before the first snapshot of a newly
//! followed document has been applied. Both pushed snapshots and write
//! acknowledgements carry the store revision: a snapshot older than the
//! revision already held is dropped. Two synchronizers writing the
//! same document still race; the store keeps whichever write lands last.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use shopfront_core::{CartLineItem, CartSnapshot, CartTotals, Product, Revision, UserId};

use super::CartError;
use super::lines::{with_added, with_quantity, without_index};
use super::store::{AbortOnDrop, CartStore, CartSubscription};

/// Handle to the signed-in user's cart.
///
/// Cheaply cloneable; clones share the same view and subscription. The
/// subscription is released when the identity changes or the last handle is
/// dropped.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CartStore>,
    view: Mutex<CartView>,
    /// Held across each read-modify-write.
    write_lock: tokio::sync::Mutex<()>,
    changes: watch::Sender<Vec<CartLineItem>>,
}

#[derive(Default)]
struct CartView {
    identity: Option<UserId>,
    items: Vec<CartLineItem>,
    revision: Revision,
    /// Bumped on every identity change; feed events and write acks from an
    /// older generation are discarded.
    generation: u64,
    feed: Option<AbortOnDrop>,
}

impl Inner {
    fn view(&self) -> MutexGuard<'_, CartView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, items: &[CartLineItem]) {
        self.changes.send_replace(items.to_vec());
    }

    fn apply_snapshot(&self, generation: u64, snapshot: CartSnapshot) {
        let mut view = self.view();
        if view.generation != generation {
            return;
        }
        if snapshot.revision < view.revision {
            debug!(
                revision = snapshot.revision,
                held = view.revision,
                "dropping stale cart snapshot"
            );
            return;
        }

        view.revision = snapshot.revision;
        view.items = snapshot.into_items();
        self.publish(&view.items);
    }

    fn apply_write(&self, generation: u64, items: Vec<CartLineItem>, revision: Revision) {
        let mut view = self.view();
        if view.generation != generation || revision < view.revision {
            return;
        }

        view.revision = revision;
        view.items = items;
        self.publish(&view.items);
    }

    fn fail_feed(&self, generation: u64) {
        let mut view = self.view();
        if view.generation != generation {
            return;
        }

        view.items.clear();
        view.revision = 0;
        // Dropping the guard aborts the calling task once it next yields;
        // it is about to return anyway.
        view.feed = None;
        self.publish(&view.items);
    }
}

impl CartSynchronizer {
    /// Create a synchronizer with no signed-in user.
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                store,
                view: Mutex::new(CartView::default()),
                write_lock: tokio::sync::Mutex::new(()),
                changes,
            }),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Switch the cart to `identity`.
    ///
    /// Any previous subscription is released and the local items reset to
    /// empty before the new subscription is attached. With `None` the cart
    /// stays empty and mutations become no-ops.
    ///
    /// Mutations wait until the first snapshot of the new document has been
    /// applied, so a write issued right after sign-in builds on the stored
    /// cart rather than on an empty one. Stores push the current state first
    /// on every subscription; a store that never does stalls mutations.
    ///
    /// A subscription failure is logged and leaves an empty cart with no
    /// live feed; it is not retried.
    #[instrument(skip(self), fields(user = identity.as_ref().map(UserId::as_str)))]
    pub async fn set_identity(&self, identity: Option<UserId>) {
        let _write = self.inner.write_lock.lock().await;

        let generation = {
            let mut view = self.inner.view();
            let unchanged = view.identity == identity
                && view.feed.as_ref().is_some_and(|feed| !feed.is_finished());
            if unchanged {
                return;
            }

            view.generation += 1;
            view.identity.clone_from(&identity);
            view.items.clear();
            view.revision = 0;
            view.feed = None;
            self.inner.publish(&view.items);
            view.generation
        };

        let Some(user) = identity else {
            info!("cart identity cleared");
            return;
        };

        let mut subscription = match self.inner.store.subscribe(&user).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(user = %user, error = %e, "failed to attach cart subscription");
                return;
            }
        };

        match subscription.next().await {
            Some(Ok(snapshot)) => self.inner.apply_snapshot(generation, snapshot),
            Some(Err(e)) => {
                warn!(user = %user, error = %e, "cart feed failed before first snapshot");
                return;
            }
            None => {
                warn!(user = %user, "cart feed closed before first snapshot");
                return;
            }
        }

        // The write lock is held, so no other identity change can have
        // happened since `generation` was taken.
        let mut view = self.inner.view();
        let task = tokio::spawn(run_feed(
            Arc::downgrade(&self.inner),
            generation,
            subscription,
        ));
        view.feed = Some(AbortOnDrop(task));
        info!(user = %user, revision = view.revision, "cart subscription attached");
    }

    /// Follow an identity signal until its sender is dropped.
    ///
    /// The returned task keeps this synchronizer alive while it runs.
    #[must_use]
    pub fn follow_identity(&self, mut identity: watch::Receiver<Option<UserId>>) -> JoinHandle<()> {
        let cart = self.clone();
        tokio::spawn(async move {
            loop {
                let current = identity.borrow_and_update().clone();
                cart.set_identity(current).await;
                if identity.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// The identity the cart currently follows.
    #[must_use]
    pub fn identity(&self) -> Option<UserId> {
        self.inner.view().identity.clone()
    }

    /// Whether a push feed is currently attached.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .view()
            .feed
            .as_ref()
            .is_some_and(|feed| !feed.is_finished())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current local line items.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner.view().items.clone()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        shopfront_core::item_count(&self.inner.view().items)
    }

    /// Order summary for the current lines.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::for_items(&self.inner.view().items)
    }

    /// Revision of the document state the local view reflects.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.inner.view().revision
    }

    /// Watch the local line items.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Vec<CartLineItem>> {
        self.inner.changes.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write is rejected.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(&self, product: &Product, quantity: u32) -> Result<(), CartError> {
        let line = CartLineItem::from_product(product, quantity);
        self.mutate("add_item", |items| Some(with_added(items, line)))
            .await
    }

    /// Set the quantity of the line at `index`.
    ///
    /// The quantity is not clamped. An out-of-range index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write is rejected.
    #[instrument(skip(self))]
    pub async fn set_item_quantity(&self, index: usize, quantity: u32) -> Result<(), CartError> {
        self.mutate("set_item_quantity", |items| {
            with_quantity(items, index, quantity)
        })
        .await
    }

    /// Remove the line at `index`. An out-of-range index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write is rejected.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, index: usize) -> Result<(), CartError> {
        self.mutate("remove_item", |items| without_index(items, index))
            .await
    }

    /// Replace the cart with an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write is rejected.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.mutate("clear", |_| Some(Vec::new())).await
    }

    /// Read-modify-write against the local items.
    ///
    /// `next` returns `None` when there is nothing to write. Without a
    /// signed-in user the mutation is skipped.
    async fn mutate<F>(&self, operation: &'static str, next: F) -> Result<(), CartError>
    where
        F: FnOnce(&[CartLineItem]) -> Option<Vec<CartLineItem>> + Send,
    {
        let _write = self.inner.write_lock.lock().await;

        let (user, generation, items) = {
            let view = self.inner.view();
            let Some(user) = view.identity.clone() else {
                debug!(operation, "no signed-in user, cart mutation skipped");
                return Ok(());
            };
            let Some(items) = next(&view.items) else {
                debug!(operation, "cart mutation had nothing to write");
                return Ok(());
            };
            (user, view.generation, items)
        };

        let revision = self
            .inner
            .store
            .replace(&user, &items)
            .await
            .inspect_err(|e| warn!(operation, user = %user, error = %e, "cart write failed"))?;

        debug!(operation, user = %user, revision, lines = items.len(), "cart written");
        self.inner.apply_write(generation, items, revision);
        Ok(())
    }
}

/// Drive one subscription until it ends, the identity changes, or the
/// synchronizer is dropped.
async fn run_feed(inner: Weak<Inner>, generation: u64, mut subscription: CartSubscription) {
    while let Some(event) = subscription.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match event {
            Ok(snapshot) => inner.apply_snapshot(generation, snapshot),
            Err(e) => {
                warn!(error = %e, "cart feed failed, cart reset to empty");
                inner.fail_feed(generation);
                return;
            }
        }
    }

    debug!("cart feed closed by store");
}
