//! Order history queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use cartwright_core::{OrderId, OrderLineId, OrderStatus, Price, ProductId, Quantity, UserId};

use super::{PgStore, RepositoryError};
use crate::models::{Order, OrderLine, OrderSummary};
use crate::store::OrderStore;

pub(super) const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, created_at";
pub(super) const ORDER_LINE_COLUMNS: &str =
    "id, order_id, product_id, quantity, price_at_purchase";

#[derive(sqlx::FromRow)]
pub(super) struct OrderRow {
    id: i32,
    user_id: i32,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    pub(super) const fn id(&self) -> OrderId {
        OrderId::new(self.id)
    }

    pub(super) fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            total_amount: self.total_amount,
            status: self.status,
            created_at: self.created_at,
            lines,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    quantity: i32,
    price_at_purchase: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quantity on order line {}: {e}", row.id))
        })?;
        let price_at_purchase = Price::new(row.price_at_purchase).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price on order line {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity,
            price_at_purchase,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: i32,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    item_count: i64,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            total_amount: row.total_amount,
            status: row.status,
            created_at: row.created_at,
            item_count: row.item_count,
        }
    }
}

/// Load an order's lines, ordered by product ID.
pub(super) async fn fetch_lines(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderLine>, RepositoryError> {
    let rows: Vec<OrderLineRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_LINE_COLUMNS} FROM storefront.order_line WHERE order_id = $1 ORDER BY product_id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(OrderLine::try_from).collect()
}

#[async_trait]
impl OrderStore for PgStore {
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows: Vec<OrderSummaryRow> = sqlx::query_as(
            r"
            SELECT o.id, o.total_amount, o.status, o.created_at, COUNT(l.id) AS item_count
            FROM storefront.customer_order o
            LEFT JOIN storefront.order_line l ON l.order_id = o.id
            WHERE o.user_id = $1
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderSummary::from).collect())
    }

    async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1 AND user_id = $2"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lines = fetch_lines(&mut conn, order_id).await?;
        Ok(Some(row.into_order(lines)))
    }
}
