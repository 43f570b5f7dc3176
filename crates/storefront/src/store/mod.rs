//! Storage seams for the storefront.
//!
//! Each concern has its own trait so services depend only on what they use.
//! [`Storefront`] bundles them for `AppState`. Two implementations exist:
//! [`crate::db::PgStore`] for production and [`MemoryStore`] for tests and
//! local development.
//!
//! # Checkout transactions
//!
//! [`CheckoutStore::begin_checkout`] opens a [`CheckoutTransaction`] scoped to
//! one user. Everything read through the transaction is isolated from
//! concurrent checkouts until it commits:
//!
//! - the user's cart lines are locked for the lifetime of the transaction
//! - each product read via `lock_product` stays locked until commit/rollback
//! - `conditional_decrement` only succeeds if the locked stock covers the
//!   requested quantity
//! - nothing written through the transaction is visible to other readers
//!   before `commit`, and dropping the transaction without committing rolls
//!   everything back
//!
//! Callers must lock products in ascending `ProductId` order.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartwright_core::{Email, OrderId, ProductId, Quantity, UserId, UserRole};

pub use crate::db::RepositoryError;
use crate::models::{
    CartLine, NewOrder, NewProduct, NewUser, Order, OrderSummary, Product, ProductFilter,
    ProductUpdate, User,
};
pub use memory::MemoryStore;

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account.
    ///
    /// Returns `RepositoryError::Conflict` if `(email, role)` is taken.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    /// Get an account by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Get an account by email and role.
    async fn find_user(
        &self,
        email: &Email,
        role: UserRole,
    ) -> Result<Option<User>, RepositoryError>;

    /// Get the stored password hash for an account.
    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    /// Record a successful sign-in.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Activate or deactivate an account. Returns the updated account.
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    async fn set_active(&self, id: UserId, active: bool) -> Result<User, RepositoryError>;

    /// Store a password-reset token hash, replacing any previous one.
    async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Atomically consume a reset token and set a new password hash.
    ///
    /// Succeeds only if `token_hash` matches a token that expires after `now`.
    /// Returns the account whose password changed, or `None`.
    async fn reset_password(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        new_password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError>;
}

/// Product storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a product owned by admin `owner`.
    async fn create_product(
        &self,
        owner: UserId,
        new: NewProduct,
    ) -> Result<Product, RepositoryError>;

    /// Get a product by ID.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// List products matching `filter`, ordered by ID, honoring `skip`/`limit`.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    /// Apply a partial update. Returns `None` if the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Delete a product. Returns `false` if it did not exist.
    ///
    /// Returns `RepositoryError::Conflict` if an order line references it.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

/// Per-user cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All lines in the user's cart, ordered by product ID.
    async fn list_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Get a single line.
    async fn get_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Create the line, or increment its quantity if it exists.
    async fn add_to_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError>;

    /// Overwrite the quantity of an existing line. Returns `None` if absent.
    async fn set_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Remove a line. Returns `false` if it did not exist.
    async fn remove_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Remove every line. Returns the number removed.
    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}

/// Read access to completed orders. Orders are only written by checkout.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The user's orders, newest first.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError>;

    /// One order, only if it belongs to `user_id`.
    async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Opens checkout transactions.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Begin a transaction over `user_id`'s cart.
    async fn begin_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError>;
}

/// One all-or-nothing checkout. See the module docs for isolation rules.
#[async_trait]
pub trait CheckoutTransaction: Send {
    /// The user's cart lines, ordered by product ID.
    async fn cart_lines(&mut self) -> Result<Vec<CartLine>, RepositoryError>;

    /// Read and lock a product until the transaction ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Decrement stock by `quantity` only if at least `quantity` remains.
    ///
    /// Returns `false` (and changes nothing) if stock is insufficient or the
    /// product no longer exists.
    async fn conditional_decrement(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError>;

    /// Write the order and its lines in one step.
    async fn create_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Delete every line in the user's cart.
    async fn clear_cart(&mut self) -> Result<u64, RepositoryError>;

    /// Make every write visible at once.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// Discard every write.
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Everything the storefront needs from storage.
#[async_trait]
pub trait Storefront: UserStore + CatalogStore + CartStore + OrderStore + CheckoutStore {
    /// Cheap connectivity check for readiness.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
