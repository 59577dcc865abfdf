//! `PostgreSQL` cart document store.
//!
//! # Table: `storefront.cart`
//!
//! One row per user. `items` holds the line items as JSONB; a NULL `items`
//! column marks a deleted document whose revision is kept. Revisions come
//! from the `storefront.cart_revision_seq` sequence, so they increase across
//! all documents.
//!
//! # Push feed
//!
//! Every write runs `pg_notify('cart_changed', user_id)` in the same
//! transaction. Subscribers `LISTEN` on that channel through a dedicated
//! connection and re-read the document whenever their user id is announced.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use shopfront_core::{CartLineItem, CartSnapshot, Revision, UserId};

use super::CartError;
use super::store::{CartStore, CartSubscription};

/// Notification channel announcing changed cart documents.
pub const CART_CHANNEL: &str = "cart_changed";

/// [`CartStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn notify(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: &UserId,
    ) -> Result<(), CartError> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CART_CHANNEL)
            .bind(user)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Convert a `(items, revision)` row into a snapshot.
fn snapshot_from_row(row: Option<(Option<Json<Vec<CartLineItem>>>, i64)>) -> CartSnapshot {
    match row {
        Some((Some(Json(items)), revision)) => {
            CartSnapshot::present(items, to_revision(revision))
        }
        Some((None, revision)) => CartSnapshot::missing(to_revision(revision)),
        None => CartSnapshot::missing(0),
    }
}

fn to_revision(value: i64) -> Revision {
    Revision::try_from(value).unwrap_or(0)
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip(self), fields(user = %user))]
    async fn fetch(&self, user: &UserId) -> Result<CartSnapshot, CartError> {
        let row: Option<(Option<Json<Vec<CartLineItem>>>, i64)> =
            sqlx::query_as("SELECT items, revision FROM storefront.cart WHERE user_id = $1")
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;

        Ok(snapshot_from_row(row))
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, CartError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| CartError::Subscription(e.to_string()))?;
        listener
            .listen(CART_CHANNEL)
            .await
            .map_err(|e| CartError::Subscription(e.to_string()))?;

        // Read after LISTEN so no change between the two is missed.
        let initial = self.fetch(user).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(initial));

        let store = self.clone();
        let user = user.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() == user.as_str() => {
                        let event = store.fetch(&user).await;
                        let failed = event.is_err();
                        if tx.send(event).is_err() || failed {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(user = %user, error = %e, "cart listener failed");
                        let _ = tx.send(Err(CartError::Subscription(e.to_string())));
                        break;
                    }
                }
            }
            debug!(user = %user, "cart listener stopped");
        });

        Ok(CartSubscription::with_task(rx, task))
    }

    #[instrument(skip(self, items), fields(user = %user, lines = items.len()))]
    async fn replace(&self, user: &UserId, items: &[CartLineItem]) -> Result<Revision, CartError> {
        let mut tx = self.pool.begin().await?;

        let (revision,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO storefront.cart (user_id, items, revision, updated_at)
            VALUES ($1, $2, nextval('storefront.cart_revision_seq'), now())
            ON CONFLICT (user_id) DO UPDATE
                SET items = EXCLUDED.items,
                    -- Drawn under the row lock so revisions commit in order.
                    revision = nextval('storefront.cart_revision_seq'),
                    updated_at = EXCLUDED.updated_at
            RETURNING revision
            ",
        )
        .bind(user)
        .bind(Json(items))
        .fetch_one(&mut *tx)
        .await?;

        Self::notify(&mut tx, user).await?;
        tx.commit().await?;

        Ok(to_revision(revision))
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn delete(&self, user: &UserId) -> Result<Revision, CartError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE storefront.cart
            SET items = NULL,
                revision = nextval('storefront.cart_revision_seq'),
                updated_at = now()
            WHERE user_id = $1 AND items IS NOT NULL
            RETURNING revision
            ",
        )
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((revision,)) = row else {
            tx.rollback().await?;
            return Ok(self.fetch(user).await?.revision);
        };

        Self::notify(&mut tx, user).await?;
        tx.commit().await?;

        Ok(to_revision(revision))
    }
}
