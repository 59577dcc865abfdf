//! Cart synchronizer integration tests against the in-memory store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};

use shopfront_core::{CartLineItem, CartSnapshot, Revision, UserId};
use shopfront_integration_tests::{eventually, product, user};
use shopfront_storefront::cart::{
    CartError, CartStore, CartSubscription, CartSynchronizer, FeedEvent, MemoryCartStore,
};

fn synchronizer() -> (Arc<MemoryCartStore>, CartSynchronizer) {
    let store = Arc::new(MemoryCartStore::new());
    let cart = CartSynchronizer::new(store.clone());
    (store, cart)
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_distinct_products_become_separate_lines() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    cart.set_identity(Some(alice.clone())).await;

    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    cart.add_item(&product(2, "T-Shirt", 2230, "clothing"), 2)
        .await
        .unwrap();

    let items = cart.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Backpack");
    assert_eq!(items[1].quantity, 2);
    assert_eq!(cart.item_count(), 3);
    assert_eq!(store.document(&alice).unwrap(), items);
}

#[tokio::test]
async fn test_adding_same_product_merges_quantities() {
    let (_store, cart) = synchronizer();
    cart.set_identity(Some(user("alice"))).await;
    let backpack = product(1, "Backpack", 10995, "bags");

    cart.add_item(&backpack, 2).await.unwrap();
    cart.add_item(&backpack, 3).await.unwrap();

    let items = cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);
}

#[tokio::test]
async fn test_totals_follow_the_lines() {
    let (_store, cart) = synchronizer();
    cart.set_identity(Some(user("alice"))).await;

    cart.add_item(&product(2, "T-Shirt", 2000, "clothing"), 2)
        .await
        .unwrap();
    let totals = cart.totals();
    assert_eq!(totals.subtotal, Decimal::new(4000, 2));
    assert_eq!(totals.shipping, Decimal::new(10, 0));

    cart.set_item_quantity(0, 6).await.unwrap();
    let totals = cart.totals();
    assert_eq!(totals.subtotal, Decimal::new(12000, 2));
    assert_eq!(totals.shipping, Decimal::ZERO);
}

#[tokio::test]
async fn test_removing_same_index_twice() {
    let (_store, cart) = synchronizer();
    cart.set_identity(Some(user("alice"))).await;
    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    cart.add_item(&product(2, "T-Shirt", 2230, "clothing"), 1)
        .await
        .unwrap();

    cart.remove_item(0).await.unwrap();
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].title, "T-Shirt");

    cart.remove_item(0).await.unwrap();
    assert!(cart.items().is_empty());

    // Out of range now; nothing to write.
    let revision = cart.revision();
    cart.remove_item(0).await.unwrap();
    assert_eq!(cart.revision(), revision);
}

#[tokio::test]
async fn test_clear_writes_empty_document() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    cart.set_identity(Some(alice.clone())).await;
    cart.add_item(&product(1, "Backpack", 10995, "bags"), 4)
        .await
        .unwrap();

    cart.clear().await.unwrap();

    assert!(cart.items().is_empty());
    assert_eq!(store.document(&alice), Some(Vec::new()));
}

#[tokio::test]
async fn test_concurrent_adds_are_both_kept() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    cart.set_identity(Some(alice.clone())).await;
    let backpack = product(1, "Backpack", 10995, "bags");
    let shirt = product(2, "T-Shirt", 2230, "clothing");

    let (a, b) = tokio::join!(cart.add_item(&backpack, 1), cart.add_item(&shirt, 1));
    a.unwrap();
    b.unwrap();

    let stored = store.document(&alice).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(cart.items().len(), 2);
}

#[tokio::test]
async fn test_mutations_without_identity_are_noops() {
    let (store, cart) = synchronizer();

    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    cart.clear().await.unwrap();

    assert!(cart.items().is_empty());
    assert!(store.document(&user("alice")).is_none());
}

#[tokio::test]
async fn test_write_failure_leaves_view_unchanged() {
    let (store, cart) = synchronizer();
    cart.set_identity(Some(user("alice"))).await;
    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    let before = cart.items();

    store.set_read_only(true);
    let err = cart
        .add_item(&product(2, "T-Shirt", 2230, "clothing"), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::WriteRejected(_)));
    assert_eq!(cart.items(), before);
}

// =============================================================================
// Identity and feed
// =============================================================================

#[tokio::test]
async fn test_existing_document_loads_on_sign_in() {
    let store = Arc::new(MemoryCartStore::new());
    let alice = user("alice");
    let line = CartLineItem::from_product(&product(3, "Bracelet", 69500, "jewelery"), 2);
    store.replace(&alice, &[line.clone()]).await.unwrap();

    let cart = CartSynchronizer::new(store.clone());
    cart.set_identity(Some(alice)).await;

    eventually("stored cart", || cart.items() == vec![line.clone()]).await;
    assert!(cart.is_subscribed());
}

#[tokio::test]
async fn test_first_add_after_sign_in_builds_on_stored_cart() {
    let store = Arc::new(MemoryCartStore::new());
    let alice = user("alice");
    let backpack = CartLineItem::from_product(&product(1, "Backpack", 10995, "bags"), 1);
    store.replace(&alice, &[backpack.clone()]).await.unwrap();

    let cart = CartSynchronizer::new(store.clone());
    cart.set_identity(Some(alice.clone())).await;
    cart.add_item(&product(2, "T-Shirt", 2230, "clothing"), 1)
        .await
        .unwrap();

    let stored = store.document(&alice).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0], backpack);
    assert_eq!(stored[1].title, "T-Shirt");
    assert_eq!(cart.items(), stored);
}

#[tokio::test]
async fn test_add_issued_during_sign_in_waits_for_stored_cart() {
    let store = Arc::new(MemoryCartStore::new());
    let alice = user("alice");
    let backpack = CartLineItem::from_product(&product(1, "Backpack", 10995, "bags"), 2);
    store.replace(&alice, &[backpack.clone()]).await.unwrap();

    let cart = CartSynchronizer::new(store.clone());
    let shirt = product(2, "T-Shirt", 2230, "clothing");
    let ((), added) = tokio::join!(
        cart.set_identity(Some(alice.clone())),
        cart.add_item(&shirt, 1)
    );
    added.unwrap();

    let stored = store.document(&alice).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0], backpack);
}

#[tokio::test]
async fn test_missing_document_then_first_add() {
    let (store, cart) = synchronizer();
    let bob = user("bob");
    let mut changes = cart.changes();

    cart.set_identity(Some(bob.clone())).await;
    assert!(cart.items().is_empty());
    assert!(store.document(&bob).is_none());

    cart.add_item(&product(4, "Hard Drive", 6400, "electronics"), 1)
        .await
        .unwrap();

    eventually("pushed line", || changes.borrow_and_update().len() == 1).await;
    assert_eq!(store.document(&bob).unwrap().len(), 1);
}

#[tokio::test]
async fn test_writes_from_another_session_are_pushed() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    cart.set_identity(Some(alice.clone())).await;

    let other = CartSynchronizer::new(store.clone());
    other.set_identity(Some(alice)).await;
    other
        .add_item(&product(1, "Backpack", 10995, "bags"), 2)
        .await
        .unwrap();

    eventually("pushed write", || cart.item_count() == 2).await;
}

#[tokio::test]
async fn test_logout_detaches_and_empties() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    cart.set_identity(Some(alice.clone())).await;
    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    assert_eq!(store.subscriber_count(&alice), 1);

    cart.set_identity(None).await;

    assert!(cart.items().is_empty());
    assert!(cart.identity().is_none());
    eventually("detached feed", || store.subscriber_count(&alice) == 0).await;
    // The document itself survives sign-out.
    assert_eq!(store.document(&alice).unwrap().len(), 1);
}

#[tokio::test]
async fn test_switching_user_shows_only_new_document() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    let bob = user("bob");
    store
        .replace(
            &bob,
            &[CartLineItem::from_product(&product(2, "T-Shirt", 2230, "clothing"), 1)],
        )
        .await
        .unwrap();

    cart.set_identity(Some(alice.clone())).await;
    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();

    cart.set_identity(Some(bob)).await;
    eventually("bob's cart", || {
        let items = cart.items();
        items.len() == 1 && items[0].title == "T-Shirt"
    })
    .await;
    eventually("alice detached", || store.subscriber_count(&alice) == 0).await;
}

#[tokio::test]
async fn test_follow_identity_signal() {
    let (store, cart) = synchronizer();
    let alice = user("alice");
    store
        .replace(
            &alice,
            &[CartLineItem::from_product(&product(1, "Backpack", 10995, "bags"), 1)],
        )
        .await
        .unwrap();

    let (tx, rx) = watch::channel(None);
    let task = cart.follow_identity(rx);

    tx.send(Some(alice.clone())).unwrap();
    eventually("signed in", || cart.item_count() == 1).await;

    tx.send(None).unwrap();
    eventually("signed out", || cart.identity().is_none() && cart.items().is_empty()).await;

    drop(tx);
    task.await.unwrap();
}

// =============================================================================
// Store failures
// =============================================================================

/// Store whose feed is driven by the test.
#[derive(Default)]
struct ScriptedStore {
    refuse_subscribe: bool,
    feeds: Mutex<Vec<mpsc::UnboundedSender<FeedEvent>>>,
    writes: Mutex<Vec<Vec<CartLineItem>>>,
}

impl ScriptedStore {
    fn push(&self, event: &FeedEvent) {
        for feed in self.feeds.lock().unwrap().iter() {
            let event = match event {
                Ok(snapshot) => Ok(snapshot.clone()),
                Err(e) => Err(CartError::Subscription(e.to_string())),
            };
            let _ = feed.send(event);
        }
    }
}

#[async_trait]
impl CartStore for ScriptedStore {
    async fn fetch(&self, _user: &UserId) -> Result<CartSnapshot, CartError> {
        Ok(CartSnapshot::missing(0))
    }

    async fn subscribe(&self, _user: &UserId) -> Result<CartSubscription, CartError> {
        if self.refuse_subscribe {
            return Err(CartError::Subscription("permission denied".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(CartSnapshot::missing(0))).unwrap();
        self.feeds.lock().unwrap().push(tx);
        Ok(CartSubscription::new(rx))
    }

    async fn replace(&self, _user: &UserId, items: &[CartLineItem]) -> Result<Revision, CartError> {
        let mut writes = self.writes.lock().unwrap();
        writes.push(items.to_vec());
        Ok(Revision::try_from(writes.len()).unwrap())
    }

    async fn delete(&self, _user: &UserId) -> Result<Revision, CartError> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_subscription_failure_leaves_empty_cart() {
    let store = Arc::new(ScriptedStore {
        refuse_subscribe: true,
        ..ScriptedStore::default()
    });
    let cart = CartSynchronizer::new(store);

    cart.set_identity(Some(user("alice"))).await;

    assert!(!cart.is_subscribed());
    assert!(cart.items().is_empty());
    assert_eq!(cart.identity(), Some(user("alice")));
}

#[tokio::test]
async fn test_feed_error_resets_cart() {
    let store = Arc::new(ScriptedStore::default());
    let cart = CartSynchronizer::new(store.clone());
    cart.set_identity(Some(user("alice"))).await;

    let line = CartLineItem::from_product(&product(1, "Backpack", 10995, "bags"), 1);
    store.push(&Ok(CartSnapshot::present(vec![line], 3)));
    eventually("pushed snapshot", || cart.item_count() == 1).await;

    store.push(&Err(CartError::Subscription("connection lost".to_string())));
    eventually("reset after feed error", || {
        cart.items().is_empty() && !cart.is_subscribed()
    })
    .await;
}

#[tokio::test]
async fn test_snapshot_older_than_write_is_ignored() {
    let store = Arc::new(ScriptedStore::default());
    let cart = CartSynchronizer::new(store.clone());
    cart.set_identity(Some(user("alice"))).await;

    cart.add_item(&product(1, "Backpack", 10995, "bags"), 1)
        .await
        .unwrap();
    cart.add_item(&product(2, "T-Shirt", 2230, "clothing"), 1)
        .await
        .unwrap();
    assert_eq!(cart.revision(), 2);

    // A late push of revision 1 must not roll the cart back.
    let first = store.writes.lock().unwrap()[0].clone();
    store.push(&Ok(CartSnapshot::present(first, 1)));
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(cart.items().len(), 2);
    assert_eq!(cart.revision(), 2);
}
