//! Business logic services for storefront.
//!
//! Services borrow a store for the duration of a call and are generic over
//! the store traits they need, so handlers can pass `&dyn Storefront` and
//! tests can pass a concrete `MemoryStore`.
//!
//! # Services
//!
//! - `auth` - Accounts, sign-in, password reset, identity resolution
//! - `catalog` - Product browsing and admin CRUD
//! - `cart` - Cart lines with advisory stock checks
//! - `checkout` - Cart to order, atomically
//! - `orders` - Order history
//! - `email` - Transactional email

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod orders;
