//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types
//! (see `db`) and HTTP payloads (see `routes`).

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::CartLine;
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, OrderSummary, TotalTooLarge};
pub use product::{NewProduct, Product, ProductFilter, ProductUpdate};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{NewUser, User};
