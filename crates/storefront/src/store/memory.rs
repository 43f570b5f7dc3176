//! In-process store used by tests and `STOREFRONT_DATABASE_URL=memory`.
//!
//! Locking mirrors the row locks `PgStore` takes:
//!
//! - each user's cart sits behind its own mutex
//! - each product sits behind its own mutex; a deleted product leaves `None`
//!   in its slot so waiters observe the deletion
//! - a checkout holds its cart guard, then product guards in ascending ID
//!   order, and applies all staged writes in `commit`
//! - `commit` takes the order map last and applies every write without
//!   yielding, so cancelling a checkout at any await leaves no effects
//!
//! No code path waits on a cart while holding a product guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use cartwright_core::{Email, OrderId, OrderLineId, ProductId, Quantity, UserId, UserRole};

use super::{
    CartStore, CatalogStore, CheckoutStore, CheckoutTransaction, OrderStore, RepositoryError,
    Storefront, UserStore,
};
use crate::models::{
    CartLine, NewOrder, NewProduct, NewUser, Order, OrderLine, OrderSummary, Product,
    ProductFilter, ProductUpdate, User,
};

type ProductSlot = Arc<Mutex<Option<Product>>>;
type CartSlot = Arc<Mutex<BTreeMap<ProductId, CartLine>>>;

struct UserRecord {
    user: User,
    password_hash: String,
    reset_token: Option<(String, DateTime<Utc>)>,
}

#[derive(Default)]
struct Inner {
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    products: RwLock<BTreeMap<ProductId, ProductSlot>>,
    carts: RwLock<HashMap<UserId, CartSlot>>,
    orders: RwLock<BTreeMap<OrderId, Order>>,
    next_user_id: AtomicI32,
    next_product_id: AtomicI32,
    next_order_id: AtomicI32,
    next_order_line_id: AtomicI32,
}

/// Non-persistent implementation of every store trait.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn product_slot(&self, id: ProductId) -> Option<ProductSlot> {
        self.inner.products.read().await.get(&id).cloned()
    }

    async fn cart_slot(&self, user_id: UserId) -> CartSlot {
        if let Some(slot) = self.inner.carts.read().await.get(&user_id) {
            return Arc::clone(slot);
        }
        Arc::clone(self.inner.carts.write().await.entry(user_id).or_default())
    }
}

fn next_id(counter: &AtomicI32) -> i32 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.inner.users.write().await;
        if users
            .values()
            .any(|r| r.user.email == new.email && r.user.role == new.role)
        {
            return Err(RepositoryError::Conflict(
                "an account with this email and role already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(next_id(&self.inner.next_user_id)),
            name: new.name,
            email: new.email,
            role: new.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new.password_hash,
                reset_token: None,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.users.read().await.get(&id).map(|r| r.user.clone()))
    }

    async fn find_user(
        &self,
        email: &Email,
        role: UserRole,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .values()
            .find(|r| &r.user.email == email && r.user.role == role)
            .map(|r| r.user.clone()))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .get(&id)
            .map(|r| r.password_hash.clone()))
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut users = self.inner.users.write().await;
        let record = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.user.last_login_at = Some(at);
        Ok(())
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, RepositoryError> {
        let mut users = self.inner.users.write().await;
        let record = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.user.is_active = active;
        record.user.updated_at = Utc::now();
        Ok(record.user.clone())
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut users = self.inner.users.write().await;
        let record = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.reset_token = Some((token_hash.to_owned(), expires_at));
        Ok(())
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let mut users = self.inner.users.write().await;
        let Some(record) = users.values_mut().find(|r| {
            r.reset_token
                .as_ref()
                .is_some_and(|(hash, expires)| hash == token_hash && *expires > now)
        }) else {
            return Ok(None);
        };
        record.password_hash = new_password_hash.to_owned();
        record.reset_token = None;
        record.user.updated_at = now;
        Ok(Some(record.user.id))
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_product(
        &self,
        owner: UserId,
        new: NewProduct,
    ) -> Result<Product, RepositoryError> {
        if !self.inner.users.read().await.contains_key(&owner) {
            return Err(RepositoryError::Conflict(
                "product owner does not exist".to_owned(),
            ));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(next_id(&self.inner.next_product_id)),
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            category: new.category,
            image_url: new.image_url,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .products
            .write()
            .await
            .insert(product.id, Arc::new(Mutex::new(Some(product.clone()))));
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let Some(slot) = self.product_slot(id).await else {
            return Ok(None);
        };
        let product = slot.lock().await.clone();
        Ok(product)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let slots: Vec<ProductSlot> = self.inner.products.read().await.values().cloned().collect();

        let mut matching = Vec::new();
        for slot in slots {
            if let Some(product) = slot.lock().await.as_ref()
                && filter.matches(product)
            {
                matching.push(product.clone());
            }
        }

        let skip = usize::try_from(filter.skip).unwrap_or(0);
        let limit = usize::try_from(filter.limit).unwrap_or(0);
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let Some(slot) = self.product_slot(id).await else {
            return Ok(None);
        };
        let mut guard = slot.lock().await;
        let Some(product) = guard.as_mut() else {
            return Ok(None);
        };
        update.apply(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let Some(slot) = self.product_slot(id).await else {
            return Ok(false);
        };
        // Waits for any checkout holding this product to finish.
        let mut guard = slot.lock().await;
        if guard.is_none() {
            return Ok(false);
        }

        let referenced = self
            .inner
            .orders
            .read()
            .await
            .values()
            .any(|order| order.lines.iter().any(|line| line.product_id == id));
        if referenced {
            return Err(RepositoryError::Conflict(
                "product is referenced by an order".to_owned(),
            ));
        }

        *guard = None;
        self.inner.products.write().await.remove(&id);
        Ok(true)
    }
}

// =============================================================================
// Carts
// =============================================================================

#[async_trait]
impl CartStore for MemoryStore {
    async fn list_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let lines = slot.lock().await.values().cloned().collect();
        Ok(lines)
    }

    async fn get_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let line = slot.lock().await.get(&product_id).cloned();
        Ok(line)
    }

    async fn add_to_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let mut cart = slot.lock().await;
        let now = Utc::now();

        if let Some(line) = cart.get_mut(&product_id) {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
            line.updated_at = now;
            return Ok(line.clone());
        }

        let line = CartLine {
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        cart.insert(product_id, line.clone());
        Ok(line)
    }

    async fn set_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let mut cart = slot.lock().await;
        Ok(cart.get_mut(&product_id).map(|line| {
            line.quantity = quantity;
            line.updated_at = Utc::now();
            line.clone()
        }))
    }

    async fn remove_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let removed = slot.lock().await.remove(&product_id).is_some();
        Ok(removed)
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let slot = self.cart_slot(user_id).await;
        let mut cart = slot.lock().await;
        let removed = cart.len() as u64;
        cart.clear();
        Ok(removed)
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = self.inner.orders.read().await;
        let mut summaries: Vec<OrderSummary> = orders
            .values()
            .filter(|order| order.user_id == user_id)
            .map(OrderSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .inner
            .orders
            .read()
            .await
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
            .cloned())
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn begin_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let cart = self.cart_slot(user_id).await.lock_owned().await;
        Ok(Box::new(MemoryCheckout {
            store: self.clone(),
            cart,
            products: BTreeMap::new(),
            decrements: BTreeMap::new(),
            order: None,
            clear_cart: false,
        }))
    }
}

/// Staged checkout. Nothing touches shared state until `commit`.
struct MemoryCheckout {
    store: MemoryStore,
    cart: OwnedMutexGuard<BTreeMap<ProductId, CartLine>>,
    products: BTreeMap<ProductId, OwnedMutexGuard<Option<Product>>>,
    decrements: BTreeMap<ProductId, i32>,
    order: Option<Order>,
    clear_cart: bool,
}

impl MemoryCheckout {
    async fn guard(
        &mut self,
        id: ProductId,
    ) -> Option<&mut OwnedMutexGuard<Option<Product>>> {
        if !self.products.contains_key(&id) {
            let slot = self.store.product_slot(id).await?;
            self.products.insert(id, slot.lock_owned().await);
        }
        self.products.get_mut(&id)
    }
}

#[async_trait]
impl CheckoutTransaction for MemoryCheckout {
    async fn cart_lines(&mut self) -> Result<Vec<CartLine>, RepositoryError> {
        if self.clear_cart {
            return Ok(Vec::new());
        }
        Ok(self.cart.values().cloned().collect())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let staged = self.decrements.get(&id).copied().unwrap_or(0);
        Ok(self
            .guard(id)
            .await
            .and_then(|guard| guard.as_ref().cloned())
            .map(|mut product| {
                product.stock -= staged;
                product
            }))
    }

    async fn conditional_decrement(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let staged = self.decrements.get(&id).copied().unwrap_or(0);
        let Some(stock) = self
            .guard(id)
            .await
            .and_then(|guard| guard.as_ref().map(|p| p.stock))
        else {
            return Ok(false);
        };
        if stock - staged < quantity.get() {
            return Ok(false);
        }
        self.decrements.insert(id, staged + quantity.get());
        Ok(true)
    }

    async fn create_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if self.order.is_some() {
            return Err(RepositoryError::Conflict(
                "checkout already created an order".to_owned(),
            ));
        }

        let inner = &self.store.inner;
        let id = OrderId::new(next_id(&inner.next_order_id));
        let lines = order
            .lines
            .iter()
            .map(|line| OrderLine {
                id: OrderLineId::new(next_id(&inner.next_order_line_id)),
                order_id: id,
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price_at_purchase,
            })
            .collect();
        let created = Order {
            id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: Utc::now(),
            lines,
        };
        self.order = Some(created.clone());
        Ok(created)
    }

    async fn clear_cart(&mut self) -> Result<u64, RepositoryError> {
        if self.clear_cart {
            return Ok(0);
        }
        self.clear_cart = true;
        Ok(self.cart.len() as u64)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        // The only await. Once every guard is held the writes below cannot be
        // interrupted, so a dropped commit leaves nothing applied.
        let store = self.store.clone();
        let mut orders = store.inner.orders.write().await;

        let now = Utc::now();
        for (id, amount) in &self.decrements {
            if let Some(product) = self.products.get_mut(id).and_then(|g| g.as_mut()) {
                product.stock -= amount;
                product.updated_at = now;
            }
        }
        if let Some(order) = self.order.take() {
            orders.insert(order.id, order);
        }
        if self.clear_cart {
            self.cart.clear();
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl Storefront for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{OrderStatus, Price};
    use rust_decimal::Decimal;

    use std::time::Duration;

    use super::*;
    use crate::models::NewOrderLine;
    use crate::services::auth::Identity;
    use crate::services::checkout::CheckoutEngine;

    async fn seeded() -> (MemoryStore, UserId, Product) {
        let store = MemoryStore::new();
        let admin = store
            .create_user(NewUser {
                name: "Admin".to_owned(),
                email: Email::parse("admin@shop.test").unwrap(),
                password_hash: "x".to_owned(),
                role: UserRole::Admin,
            })
            .await
            .unwrap();
        let product = store
            .create_product(
                admin.id,
                NewProduct {
                    name: "Lamp".to_owned(),
                    description: None,
                    price: Price::new(Decimal::new(40, 0)).unwrap(),
                    stock: 3,
                    category: Some("lighting".to_owned()),
                    image_url: None,
                },
            )
            .await
            .unwrap();
        (store, admin.id, product)
    }

    #[tokio::test]
    async fn test_duplicate_email_and_role_conflicts() {
        let (store, _, _) = seeded().await;
        let result = store
            .create_user(NewUser {
                name: "Other".to_owned(),
                email: Email::parse("ADMIN@shop.test").unwrap(),
                password_hash: "y".to_owned(),
                role: UserRole::Admin,
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let customer = store
            .create_user(NewUser {
                name: "Same Email".to_owned(),
                email: Email::parse("admin@shop.test").unwrap(),
                password_hash: "y".to_owned(),
                role: UserRole::Customer,
            })
            .await;
        assert!(customer.is_ok());
    }

    #[tokio::test]
    async fn test_add_to_line_accumulates() {
        let (store, user, product) = seeded().await;
        store.add_to_line(user, product.id, Quantity::ONE).await.unwrap();
        let line = store
            .add_to_line(user, product.id, Quantity::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(line.quantity.get(), 3);
        assert_eq!(store.list_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_checkout_is_invisible() {
        let (store, user, product) = seeded().await;
        store
            .add_to_line(user, product.id, Quantity::new(2).unwrap())
            .await
            .unwrap();

        let mut tx = store.begin_checkout(user).await.unwrap();
        tx.lock_product(product.id).await.unwrap();
        assert!(
            tx.conditional_decrement(product.id, Quantity::new(2).unwrap())
                .await
                .unwrap()
        );
        tx.create_order(&NewOrder::new(
            user,
            OrderStatus::Completed,
            vec![NewOrderLine {
                product_id: product.id,
                quantity: Quantity::new(2).unwrap(),
                price_at_purchase: product.price,
            }],
        )
        .unwrap())
        .await
        .unwrap();
        tx.clear_cart().await.unwrap();
        drop(tx);

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
        assert!(store.list_orders(user).await.unwrap().is_empty());
        assert_eq!(store.list_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_checkout_leaves_no_effects() {
        let (store, _, product) = seeded().await;
        let buyer = store
            .create_user(NewUser {
                name: "Buyer".to_owned(),
                email: Email::parse("buyer@shop.test").unwrap(),
                password_hash: "x".to_owned(),
                role: UserRole::Customer,
            })
            .await
            .unwrap();
        store
            .add_to_line(buyer.id, product.id, Quantity::new(2).unwrap())
            .await
            .unwrap();
        let identity = Identity::from(&buyer);

        // A reader on the order map stalls `commit`; the timeout drops it there.
        let reader = store.inner.orders.read().await;
        let attempt = tokio::time::timeout(
            Duration::from_millis(50),
            CheckoutEngine::new(&store).checkout(&identity),
        )
        .await;
        assert!(attempt.is_err());
        drop(reader);

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
        assert!(store.list_orders(buyer.id).await.unwrap().is_empty());
        assert_eq!(store.list_lines(buyer.id).await.unwrap().len(), 1);

        let order = CheckoutEngine::new(&store).checkout(&identity).await.unwrap();
        assert_eq!(order.lines.len(), 1);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_conditional_decrement_respects_staged_amounts() {
        let (store, user, product) = seeded().await;
        let mut tx = store.begin_checkout(user).await.unwrap();
        let two = Quantity::new(2).unwrap();
        assert!(tx.conditional_decrement(product.id, two).await.unwrap());
        assert!(!tx.conditional_decrement(product.id, two).await.unwrap());
        assert!(tx.conditional_decrement(product.id, Quantity::ONE).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_delete_product_referenced_by_order_conflicts() {
        let (store, user, product) = seeded().await;
        let mut tx = store.begin_checkout(user).await.unwrap();
        tx.create_order(&NewOrder::new(
            user,
            OrderStatus::Completed,
            vec![NewOrderLine {
                product_id: product.id,
                quantity: Quantity::ONE,
                price_at_purchase: product.price,
            }],
        )
        .unwrap())
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let result = store.delete_product(product.id).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_unreferenced_product() {
        let (store, _, product) = seeded().await;
        assert!(store.delete_product(product.id).await.unwrap());
        assert!(store.get_product(product.id).await.unwrap().is_none());
        assert!(!store.delete_product(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_products_pages_in_id_order() {
        let (store, admin, _) = seeded().await;
        for name in ["Chair", "Desk"] {
            store
                .create_product(
                    admin,
                    NewProduct {
                        name: name.to_owned(),
                        description: None,
                        price: Price::new(Decimal::ONE).unwrap(),
                        stock: 1,
                        category: None,
                        image_url: None,
                    },
                )
                .await
                .unwrap();
        }
        let filter = ProductFilter {
            skip: 1,
            limit: 1,
            ..ProductFilter::default()
        };
        let page = store.list_products(&filter).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Chair");
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use_and_expires() {
        let (store, admin, _) = seeded().await;
        let now = Utc::now();
        store
            .set_reset_token(admin, "hash", now + chrono::Duration::minutes(15))
            .await
            .unwrap();

        assert_eq!(
            store.reset_password("hash", now, "new").await.unwrap(),
            Some(admin)
        );
        assert_eq!(store.reset_password("hash", now, "again").await.unwrap(), None);

        store
            .set_reset_token(admin, "late", now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(store.reset_password("late", now, "new").await.unwrap(), None);
    }
}
