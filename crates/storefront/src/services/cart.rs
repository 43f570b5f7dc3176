//! Cart service.
//!
//! Stock checks here are advisory: they give early feedback when adding or
//! updating a line, but only checkout decides whether stock is available.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use cartwright_core::{Price, ProductId, Quantity, QuantityError, UserId};

use crate::db::RepositoryError;
use crate::models::CartLine;
use crate::store::{CartStore, CatalogStore};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The cart has no line for this product.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    /// The resulting quantity exceeds current stock.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i32,
    },

    /// Invalid quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The cart's value cannot be represented.
    #[error("cart total is too large")]
    TotalTooLarge,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One cart line joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    /// `None` if the product was deleted after the line was added.
    pub name: Option<String>,
    pub unit_price: Option<Price>,
    pub quantity: Quantity,
    pub subtotal: Decimal,
}

/// A priced snapshot of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    /// Number of lines.
    pub total_items: usize,
    /// Sum of quantities.
    pub total_quantity: i64,
    /// Sum of subtotals at current prices.
    pub total_price: Decimal,
}

/// Cart service over any store with carts and a catalog.
pub struct CartService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CartStore + CatalogStore + ?Sized> CartService<'a, S> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Price the user's cart at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails and
    /// `CartError::TotalTooLarge` if the total overflows.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let lines = self.store.list_lines(user_id).await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut total_price = Decimal::ZERO;
        for line in lines {
            let product = self.store.get_product(line.product_id).await?;
            let unit_price = product.as_ref().map(|p| p.price);
            let subtotal = match unit_price {
                Some(price) => price
                    .checked_times(line.quantity)
                    .ok_or(CartError::TotalTooLarge)?,
                None => Decimal::ZERO,
            };
            total_price = total_price
                .checked_add(subtotal)
                .ok_or(CartError::TotalTooLarge)?;
            items.push(CartItemView {
                product_id: line.product_id,
                name: product.map(|p| p.name),
                unit_price,
                quantity: line.quantity,
                subtotal,
            });
        }

        Ok(CartView {
            total_items: items.len(),
            total_quantity: items.iter().map(|i| i64::from(i.quantity.get())).sum(),
            total_price,
            items,
        })
    }

    /// Add `quantity` of a product, creating or incrementing its line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product does not exist and
    /// `CartError::InsufficientStock` if the combined quantity exceeds stock.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, CartError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let existing = self
            .store
            .get_line(user_id, product_id)
            .await?
            .map_or(0, |line| i64::from(line.quantity.get()));
        let requested = existing + i64::from(quantity.get());
        if requested > i64::from(product.stock) {
            return Err(CartError::InsufficientStock {
                product_id,
                requested,
                available: product.stock,
            });
        }

        Ok(self.store.add_to_line(user_id, product_id, quantity).await?)
    }

    /// Overwrite the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line does not exist and
    /// `CartError::InsufficientStock` if the quantity exceeds stock.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, CartError> {
        if self.store.get_line(user_id, product_id).await?.is_none() {
            return Err(CartError::LineNotFound(product_id));
        }

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if quantity.get() > product.stock {
            return Err(CartError::InsufficientStock {
                product_id,
                requested: i64::from(quantity.get()),
                available: product.stock,
            });
        }

        self.store
            .set_line_quantity(user_id, product_id, quantity)
            .await?
            .ok_or(CartError::LineNotFound(product_id))
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        self.store.remove_line(user_id, product_id).await?;
        Ok(())
    }
}
