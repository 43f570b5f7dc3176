//! Checkout transaction on `PostgreSQL`.
//!
//! Isolation comes from row locks: `FOR UPDATE` on the user's cart lines and
//! on each product as it is read. Stock is decremented with a conditional
//! `UPDATE ... WHERE stock >= $qty`, so a decrement that would go negative
//! affects zero rows instead of tripping the `CHECK` constraint.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use cartwright_core::{ProductId, Quantity, UserId};

use super::cart::{CART_COLUMNS, CartLineRow};
use super::orders::{ORDER_COLUMNS, ORDER_LINE_COLUMNS, OrderLineRow, OrderRow};
use super::products::{PRODUCT_COLUMNS, ProductRow};
use super::{PgStore, RepositoryError};
use crate::models::{CartLine, NewOrder, Order, OrderLine, Product};
use crate::store::{CheckoutStore, CheckoutTransaction};

#[async_trait]
impl CheckoutStore for PgStore {
    async fn begin_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckout { tx, user_id }))
    }
}

/// A checkout backed by a database transaction.
///
/// Dropping it without `commit` rolls the transaction back.
struct PgCheckout {
    tx: Transaction<'static, Postgres>,
    user_id: UserId,
}

#[async_trait]
impl CheckoutTransaction for PgCheckout {
    async fn cart_lines(&mut self) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(&format!(
            r"
            SELECT {CART_COLUMNS}
            FROM storefront.cart_line
            WHERE user_id = $1
            ORDER BY product_id
            FOR UPDATE
            "
        ))
        .bind(self.user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn conditional_decrement(
        &mut self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let header: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.customer_order (user_id, total_amount, status)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(order.total_amount)
        .bind(order.status)
        .fetch_one(&mut *self.tx)
        .await?;

        let order_id = header.id();
        let insert_line = format!(
            r"
            INSERT INTO storefront.order_line (order_id, product_id, quantity, price_at_purchase)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_LINE_COLUMNS}
            "
        );

        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let row: OrderLineRow = sqlx::query_as(&insert_line)
                .bind(order_id)
                .bind(line.product_id)
                .bind(line.quantity)
                .bind(line.price_at_purchase)
                .fetch_one(&mut *self.tx)
                .await?;
            lines.push(OrderLine::try_from(row)?);
        }

        Ok(header.into_order(lines))
    }

    async fn clear_cart(&mut self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(self.user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
