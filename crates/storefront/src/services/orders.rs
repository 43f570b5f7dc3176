//! Order history service.
//!
//! Reads are scoped to the caller: another user's order is reported exactly
//! like a missing one.

use thiserror::Error;

use cartwright_core::{OrderId, UserId};

use crate::db::RepositoryError;
use crate::models::{Order, OrderSummary};
use crate::store::OrderStore;

/// Errors from order retrieval.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No such order for this user.
    #[error("order not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order history over any [`OrderStore`].
pub struct OrderService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: OrderStore + ?Sized> OrderService<'a, S> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self.store.list_orders(user_id).await?)
    }

    /// One order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or belongs
    /// to someone else.
    pub async fn detail(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(user_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}
