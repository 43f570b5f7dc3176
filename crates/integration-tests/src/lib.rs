//! Integration tests for Cartwright.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store only
//! cargo test -p cartwright-integration-tests
//!
//! # Also against PostgreSQL
//! TEST_DATABASE_URL=postgres://localhost/cartwright_test cargo test -p cartwright-integration-tests
//! ```
//!
//! The helpers here are generic over the store traits so the same scenarios
//! run against `MemoryStore` and `PgStore`.

#![allow(clippy::missing_panics_doc)]

pub mod scenarios;

use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

use cartwright_core::{Email, Price, ProductId, Quantity, UserId, UserRole};
use cartwright_storefront::db::{self, PgStore};
use cartwright_storefront::models::{NewProduct, NewUser, Product};
use cartwright_storefront::services::auth::Identity;
use cartwright_storefront::store::{CartStore, CatalogStore, UserStore};

/// Environment variable naming the PostgreSQL test database.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// An email that will not collide with earlier runs against a shared database.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@cartwright.test", Uuid::new_v4().simple())
}

/// Parse a decimal literal into a `Price`.
#[must_use]
pub fn price(amount: &str) -> Price {
    Price::new(Decimal::from_str(amount).expect("decimal literal")).expect("valid price")
}

/// Create an account directly in the store and return its identity.
///
/// Skips password hashing; these accounts never sign in.
pub async fn account<S: UserStore + ?Sized>(store: &S, email: &str, role: UserRole) -> Identity {
    let user = store
        .create_user(NewUser {
            name: "Integration".to_owned(),
            email: Email::parse(email).expect("valid email"),
            password_hash: "unused".to_owned(),
            role,
        })
        .await
        .expect("create user");
    Identity::from(&user)
}

/// Create a customer with a fresh email.
pub async fn customer<S: UserStore + ?Sized>(store: &S) -> Identity {
    account(store, &unique_email("customer"), UserRole::Customer).await
}

/// Create an admin with a fresh email.
pub async fn admin<S: UserStore + ?Sized>(store: &S) -> Identity {
    account(store, &unique_email("admin"), UserRole::Admin).await
}

/// Create a product.
pub async fn product<S: CatalogStore + ?Sized>(
    store: &S,
    owner: UserId,
    name: &str,
    unit_price: &str,
    stock: i32,
) -> Product {
    store
        .create_product(
            owner,
            NewProduct {
                name: name.to_owned(),
                description: None,
                price: price(unit_price),
                stock,
                category: None,
                image_url: None,
            },
        )
        .await
        .expect("create product")
}

/// Put `quantity` of a product in the user's cart, bypassing stock checks.
pub async fn add_to_cart<S: CartStore + ?Sized>(
    store: &S,
    user: UserId,
    product: ProductId,
    quantity: i64,
) {
    store
        .add_to_line(user, product, Quantity::new(quantity).expect("positive quantity"))
        .await
        .expect("add to cart");
}

/// Current stock of a product.
pub async fn stock_of<S: CatalogStore + ?Sized>(store: &S, id: ProductId) -> i32 {
    store
        .get_product(id)
        .await
        .expect("get product")
        .expect("product exists")
        .stock
}

/// Connect to `TEST_DATABASE_URL` and apply migrations.
///
/// Returns `None` when the variable is unset so tests can skip.
pub async fn postgres_store() -> Option<PgStore> {
    let url = std::env::var(TEST_DATABASE_URL).ok()?;
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    Some(PgStore::new(pool))
}
