//! Checkout engine.
//!
//! Converts a user's cart into an immutable order inside one
//! [`CheckoutTransaction`]:
//!
//! 1. Authorize: the identity must be active and hold the customer role.
//! 2. Read the cart (locked) and each product (locked, ascending ID).
//!    A missing product or a quantity above stock aborts with nothing written.
//! 3. Snapshot each product's current price into the order lines. A total
//!    the order cannot record aborts with nothing written.
//! 4. Decrement stock conditionally, write the order, clear the cart.
//! 5. Commit. Any storage failure from step 4 on rolls back and surfaces as
//!    `PersistenceFailure`.
//!
//! Two checkouts that would jointly oversell a product serialize on that
//! product's lock; the second sees the reduced stock and fails validation.

use thiserror::Error;
use tracing::instrument;

use cartwright_core::{OrderStatus, ProductId, UserRole};

use crate::db::RepositoryError;
use crate::models::{CartLine, NewOrder, NewOrderLine, Order, TotalTooLarge};
use crate::services::auth::Identity;
use crate::store::{CheckoutStore, CheckoutTransaction};

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line refers to a product that no longer exists.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// A cart line asks for more than the product has in stock.
    #[error(
        "Not enough stock for {name} (product {product_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: i32,
        available: i32,
    },

    /// The order total is above what an order can record.
    #[error("Order total exceeds the maximum of {}", NewOrder::MAX_TOTAL)]
    TotalTooLarge,

    /// The account is deactivated.
    #[error("Inactive user")]
    InactiveUser,

    /// The identity may not check out (not a customer).
    #[error("not authorized to check out")]
    Unauthorized,

    /// Storage failed before anything was written.
    #[error("storage error: {0}")]
    Storage(#[source] RepositoryError),

    /// The atomic write could not complete. Nothing was applied.
    #[error("checkout could not be completed")]
    PersistenceFailure(#[source] RepositoryError),
}

/// A validated line with the price it will be sold at.
struct PricedLine {
    line: NewOrderLine,
    name: String,
    available: i32,
}

/// The checkout engine over any [`CheckoutStore`].
pub struct CheckoutEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CheckoutStore + ?Sized> CheckoutEngine<'a, S> {
    /// Create a new checkout engine.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Check out the identity's cart.
    ///
    /// Not idempotent: each successful call produces a new order, and a
    /// repeated call against the now-empty cart fails with `EmptyCart`.
    ///
    /// # Errors
    ///
    /// Returns `InactiveUser`/`Unauthorized` before touching storage,
    /// `EmptyCart`, `ProductNotFound`, `InsufficientStock` or `TotalTooLarge`
    /// with no side effects, and `PersistenceFailure` if the atomic write failed (also
    /// with no side effects). Callers must not retry automatically.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn checkout(&self, identity: &Identity) -> Result<Order, CheckoutError> {
        authorize(identity)?;
        let user_id = identity.user_id;
        tracing::info!("checkout started");

        let mut tx = self
            .store
            .begin_checkout(user_id)
            .await
            .map_err(CheckoutError::Storage)?;

        let priced = match validate(tx.as_mut()).await {
            Ok(priced) => priced,
            Err(e) => {
                discard(tx).await;
                return Err(e);
            }
        };
        tracing::debug!(lines = priced.len(), "cart validated");

        let order = match NewOrder::new(
            user_id,
            OrderStatus::Completed,
            priced.iter().map(|p| p.line).collect(),
        ) {
            Ok(order) => order,
            Err(TotalTooLarge) => {
                tracing::warn!("checkout rejected: order total too large");
                discard(tx).await;
                return Err(CheckoutError::TotalTooLarge);
            }
        };

        let created = match apply(tx.as_mut(), &priced, &order).await {
            Ok(created) => created,
            Err(e) => {
                discard(tx).await;
                if let CheckoutError::PersistenceFailure(ref source) = e {
                    tracing::error!(error = %source, "checkout write failed, rolled back");
                }
                return Err(e);
            }
        };

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, "checkout commit failed");
            CheckoutError::PersistenceFailure(e)
        })?;

        tracing::info!(
            order_id = %created.id,
            total = %created.total_amount,
            items = created.item_count(),
            "checkout completed"
        );
        Ok(created)
    }
}

fn authorize(identity: &Identity) -> Result<(), CheckoutError> {
    if identity.require_active().is_err() {
        tracing::warn!("checkout rejected: inactive user");
        return Err(CheckoutError::InactiveUser);
    }
    identity
        .require_role(UserRole::Customer)
        .map_err(|_| CheckoutError::Unauthorized)
}

/// Read and lock the cart and its products, pricing each line.
async fn validate(tx: &mut dyn CheckoutTransaction) -> Result<Vec<PricedLine>, CheckoutError> {
    let mut lines: Vec<CartLine> = tx.cart_lines().await.map_err(CheckoutError::Storage)?;
    if lines.is_empty() {
        tracing::warn!("checkout rejected: cart is empty");
        return Err(CheckoutError::EmptyCart);
    }
    lines.sort_by_key(|line| line.product_id);

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(product) = tx
            .lock_product(line.product_id)
            .await
            .map_err(CheckoutError::Storage)?
        else {
            tracing::warn!(product_id = %line.product_id, "checkout rejected: product not found");
            return Err(CheckoutError::ProductNotFound(line.product_id));
        };

        if line.quantity.get() > product.stock {
            tracing::warn!(
                product_id = %product.id,
                requested = line.quantity.get(),
                available = product.stock,
                "checkout rejected: insufficient stock"
            );
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                name: product.name,
                requested: line.quantity.get(),
                available: product.stock,
            });
        }

        priced.push(PricedLine {
            line: NewOrderLine {
                product_id: product.id,
                quantity: line.quantity,
                price_at_purchase: product.price,
            },
            name: product.name,
            available: product.stock,
        });
    }
    Ok(priced)
}

/// The mutating phase. Nothing here is visible until commit.
async fn apply(
    tx: &mut dyn CheckoutTransaction,
    priced: &[PricedLine],
    order: &NewOrder,
) -> Result<Order, CheckoutError> {
    for p in priced {
        let decremented = tx
            .conditional_decrement(p.line.product_id, p.line.quantity)
            .await
            .map_err(CheckoutError::PersistenceFailure)?;
        if !decremented {
            tracing::warn!(
                product_id = %p.line.product_id,
                requested = p.line.quantity.get(),
                "checkout rejected: stock changed during checkout"
            );
            return Err(CheckoutError::InsufficientStock {
                product_id: p.line.product_id,
                name: p.name.clone(),
                requested: p.line.quantity.get(),
                available: p.available,
            });
        }
    }

    let created = tx
        .create_order(order)
        .await
        .map_err(CheckoutError::PersistenceFailure)?;
    tx.clear_cart()
        .await
        .map_err(CheckoutError::PersistenceFailure)?;
    Ok(created)
}

/// Roll back, logging (not surfacing) a failed rollback: the transaction is
/// discarded either way.
async fn discard(tx: Box<dyn CheckoutTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "checkout rollback failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use cartwright_core::{Email, Price, Quantity, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{NewProduct, NewUser, Product, ProductUpdate};
    use crate::store::{CartStore, CatalogStore, MemoryStore, OrderStore, UserStore};

    struct Shop {
        store: MemoryStore,
        admin: UserId,
    }

    impl Shop {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let admin = store
                .create_user(NewUser {
                    name: "Admin".to_owned(),
                    email: Email::parse("admin@shop.test").unwrap(),
                    password_hash: "x".to_owned(),
                    role: UserRole::Admin,
                })
                .await
                .unwrap()
                .id;
            Self { store, admin }
        }

        async fn customer(&self, email: &str) -> Identity {
            let user = self
                .store
                .create_user(NewUser {
                    name: "Customer".to_owned(),
                    email: Email::parse(email).unwrap(),
                    password_hash: "x".to_owned(),
                    role: UserRole::Customer,
                })
                .await
                .unwrap();
            Identity::from(&user)
        }

        async fn product(&self, name: &str, cents: i64, stock: i32) -> Product {
            self.store
                .create_product(
                    self.admin,
                    NewProduct {
                        name: name.to_owned(),
                        description: None,
                        price: Price::new(Decimal::new(cents, 2)).unwrap(),
                        stock,
                        category: None,
                        image_url: None,
                    },
                )
                .await
                .unwrap()
        }

        async fn add(&self, who: &Identity, product: &Product, quantity: i64) {
            self.store
                .add_to_line(who.user_id, product.id, Quantity::new(quantity).unwrap())
                .await
                .unwrap();
        }

        async fn stock(&self, product: &Product) -> i32 {
            self.store
                .get_product(product.id)
                .await
                .unwrap()
                .unwrap()
                .stock
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_clears_cart() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        let ink = shop.product("Ink", 1_000, 4).await;
        shop.add(&ada, &ink, 2).await;
        shop.add(&ada, &pen, 3).await;

        let order = CheckoutEngine::new(&shop.store)
            .checkout(&ada)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.user_id, ada.user_id);
        assert_eq!(order.total_amount, Decimal::new(2_750, 2));
        let products: Vec<ProductId> = order.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(products, vec![pen.id, ink.id]);

        assert_eq!(shop.stock(&pen).await, 7);
        assert_eq!(shop.stock(&ink).await, 2);
        assert!(shop.store.list_lines(ada.user_id).await.unwrap().is_empty());

        let stored = shop
            .store
            .get_order(ada.user_id, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;

        let result = CheckoutEngine::new(&shop.store).checkout(&ada).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert!(shop.store.list_orders(ada.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_finds_empty_cart() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        shop.add(&ada, &pen, 1).await;

        let engine = CheckoutEngine::new(&shop.store);
        engine.checkout(&ada).await.unwrap();
        assert!(matches!(
            engine.checkout(&ada).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert_eq!(shop.store.list_orders(ada.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        let ink = shop.product("Ink", 1_000, 1).await;
        shop.add(&ada, &pen, 2).await;
        shop.add(&ada, &ink, 1).await;
        shop.store
            .update_product(
                ink.id,
                &ProductUpdate {
                    stock: Some(0),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();

        let result = CheckoutEngine::new(&shop.store).checkout(&ada).await;
        match result {
            Err(CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
                ..
            }) => {
                assert_eq!(product_id, ink.id);
                assert_eq!(requested, 1);
                assert_eq!(available, 0);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(shop.stock(&pen).await, 10);
        assert_eq!(shop.store.list_lines(ada.user_id).await.unwrap().len(), 2);
        assert!(shop.store.list_orders(ada.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_total_changes_nothing() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let yacht = shop.product("Yacht", 999_999_999_999, 100).await;
        let jet = shop.product("Jet", 999_999_999_999, 100).await;
        shop.add(&ada, &yacht, 60).await;
        shop.add(&ada, &jet, 60).await;

        let result = CheckoutEngine::new(&shop.store).checkout(&ada).await;
        assert!(matches!(result, Err(CheckoutError::TotalTooLarge)));

        assert_eq!(shop.stock(&yacht).await, 100);
        assert_eq!(shop.stock(&jet).await, 100);
        assert_eq!(shop.store.list_lines(ada.user_id).await.unwrap().len(), 2);
        assert!(shop.store.list_orders(ada.user_id).await.unwrap().is_empty());

        // Trimming the cart brings the total back in range.
        shop.store.remove_line(ada.user_id, jet.id).await.unwrap();
        let order = CheckoutEngine::new(&shop.store).checkout(&ada).await.unwrap();
        assert!(order.total_amount <= NewOrder::MAX_TOTAL);
        assert_eq!(shop.stock(&yacht).await, 40);
    }

    #[tokio::test]
    async fn test_lowest_product_id_is_reported_first() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let first = shop.product("First", 100, 5).await;
        let second = shop.product("Second", 100, 5).await;
        shop.add(&ada, &second, 5).await;
        shop.add(&ada, &first, 5).await;
        for product in [&first, &second] {
            shop.store
                .update_product(
                    product.id,
                    &ProductUpdate {
                        stock: Some(1),
                        ..ProductUpdate::default()
                    },
                )
                .await
                .unwrap();
        }

        let result = CheckoutEngine::new(&shop.store).checkout(&ada).await;
        assert!(matches!(
            result,
            Err(CheckoutError::InsufficientStock { product_id, .. }) if product_id == first.id
        ));
    }

    #[tokio::test]
    async fn test_deleted_product_is_reported() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        shop.add(&ada, &pen, 1).await;
        shop.store.delete_product(pen.id).await.unwrap();

        let result = CheckoutEngine::new(&shop.store).checkout(&ada).await;
        assert!(matches!(result, Err(CheckoutError::ProductNotFound(id)) if id == pen.id));
        assert_eq!(shop.store.list_lines(ada.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_is_snapshotted() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 1_000, 10).await;
        shop.add(&ada, &pen, 2).await;

        let order = CheckoutEngine::new(&shop.store)
            .checkout(&ada)
            .await
            .unwrap();
        shop.store
            .update_product(
                pen.id,
                &ProductUpdate {
                    price: Some(Price::new(Decimal::new(2_000, 2)).unwrap()),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();

        let stored = shop
            .store
            .get_order(ada.user_id, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_amount, Decimal::new(2_000, 2));
        assert_eq!(
            stored.lines[0].price_at_purchase.amount(),
            Decimal::new(1_000, 2)
        );
    }

    #[tokio::test]
    async fn test_inactive_and_admin_identities_are_refused() {
        let shop = Shop::new().await;
        let mut ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        shop.add(&ada, &pen, 1).await;
        let engine = CheckoutEngine::new(&shop.store);

        ada.active = false;
        assert!(matches!(
            engine.checkout(&ada).await,
            Err(CheckoutError::InactiveUser)
        ));

        let admin = Identity::from(&shop.store.get_user(shop.admin).await.unwrap().unwrap());
        assert!(matches!(
            engine.checkout(&admin).await,
            Err(CheckoutError::Unauthorized)
        ));
        assert_eq!(shop.stock(&pen).await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let shop = Shop::new().await;
        let last = shop.product("Last One", 5_000, 1).await;
        let ada = shop.customer("ada@shop.test").await;
        let bob = shop.customer("bob@shop.test").await;
        shop.add(&ada, &last, 1).await;
        shop.add(&bob, &last, 1).await;

        let handles: Vec<_> = [ada, bob]
            .into_iter()
            .map(|who| {
                let store = shop.store.clone();
                tokio::spawn(async move { CheckoutEngine::new(&store).checkout(&who).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(CheckoutError::InsufficientStock { available: 0, .. }) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!((succeeded, sold_out), (1, 1));
        assert_eq!(shop.stock(&last).await, 0);
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Delegates to `MemoryStore` but fails while clearing the cart.
    struct FailingClear {
        inner: MemoryStore,
    }

    struct FailingClearTx {
        inner: Box<dyn CheckoutTransaction>,
    }

    #[async_trait]
    impl CheckoutStore for FailingClear {
        async fn begin_checkout(
            &self,
            user_id: UserId,
        ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
            let inner = self.inner.begin_checkout(user_id).await?;
            Ok(Box::new(FailingClearTx { inner }))
        }
    }

    #[async_trait]
    impl CheckoutTransaction for FailingClearTx {
        async fn cart_lines(&mut self) -> Result<Vec<CartLine>, RepositoryError> {
            self.inner.cart_lines().await
        }

        async fn lock_product(
            &mut self,
            id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            self.inner.lock_product(id).await
        }

        async fn conditional_decrement(
            &mut self,
            id: ProductId,
            quantity: Quantity,
        ) -> Result<bool, RepositoryError> {
            self.inner.conditional_decrement(id, quantity).await
        }

        async fn create_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
            self.inner.create_order(order).await
        }

        async fn clear_cart(&mut self) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn test_write_failure_rolls_everything_back() {
        let shop = Shop::new().await;
        let ada = shop.customer("ada@shop.test").await;
        let pen = shop.product("Pen", 250, 10).await;
        shop.add(&ada, &pen, 4).await;

        let failing = FailingClear {
            inner: shop.store.clone(),
        };
        let result = CheckoutEngine::new(&failing).checkout(&ada).await;

        assert!(matches!(result, Err(CheckoutError::PersistenceFailure(_))));
        assert_eq!(shop.stock(&pen).await, 10);
        assert_eq!(shop.store.list_lines(ada.user_id).await.unwrap().len(), 1);
        assert!(shop.store.list_orders(ada.user_id).await.unwrap().is_empty());
    }
}
