//! Order aggregate types.
//!
//! An order and its lines are written once, by checkout, and never mutated.
//! `total_amount` is frozen at creation and always equals the sum of
//! `quantity * price_at_purchase` over the lines, and never exceeds
//! [`NewOrder::MAX_TOTAL`], the capacity of the `NUMERIC(14, 2)` column.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use cartwright_core::{OrderId, OrderLineId, OrderStatus, Price, ProductId, Quantity, UserId};

/// A persisted order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Lines ordered by product ID.
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Number of lines.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }
}

/// One purchased product within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Unit price captured at checkout.
    pub price_at_purchase: Price,
}

/// Order history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            item_count: i64::try_from(order.lines.len()).unwrap_or(i64::MAX),
        }
    }
}

/// The lines of an order add up to more than an order can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order total exceeds the maximum of {}", NewOrder::MAX_TOTAL)]
pub struct TotalTooLarge;

/// An order ready to be written, before IDs are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Largest order total, `999999999999.99`.
    pub const MAX_TOTAL: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

    /// Build an order from priced lines, deriving the total.
    ///
    /// Lines are sorted by product ID.
    ///
    /// # Errors
    ///
    /// Returns `TotalTooLarge` if the total exceeds [`NewOrder::MAX_TOTAL`].
    pub fn new(
        user_id: UserId,
        status: OrderStatus,
        mut lines: Vec<NewOrderLine>,
    ) -> Result<Self, TotalTooLarge> {
        lines.sort_by_key(|line| line.product_id);
        let total_amount = lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| {
                total.checked_add(line.subtotal()?)
            })
            .filter(|total| *total <= Self::MAX_TOTAL)
            .ok_or(TotalTooLarge)?;
        Ok(Self {
            user_id,
            status,
            total_amount,
            lines,
        })
    }
}

/// An order line ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price_at_purchase: Price,
}

impl NewOrderLine {
    /// `quantity * price_at_purchase`, or `None` on overflow.
    #[must_use]
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price_at_purchase.checked_times(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: i64, cents: i64) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new(product),
            quantity: Quantity::new(quantity).unwrap(),
            price_at_purchase: Price::new(Decimal::new(cents, 2)).unwrap(),
        }
    }

    #[test]
    fn test_new_order_derives_total() {
        let order = NewOrder::new(
            UserId::new(1),
            OrderStatus::Completed,
            vec![line(2, 3, 1000), line(1, 1, 250)],
        )
        .unwrap();
        assert_eq!(order.total_amount, Decimal::new(3250, 2));
    }

    #[test]
    fn test_total_is_bounded_by_column() {
        assert_eq!(NewOrder::MAX_TOTAL, Decimal::new(99_999_999_999_999, 2));

        // 100 units at the highest price: 999999999999.00 fits.
        let most = Price::new(Price::MAX).unwrap();
        let at_limit = NewOrderLine {
            product_id: ProductId::new(1),
            quantity: Quantity::new(100).unwrap(),
            price_at_purchase: most,
        };
        assert!(NewOrder::new(UserId::new(1), OrderStatus::Completed, vec![at_limit]).is_ok());

        let over = NewOrderLine {
            product_id: ProductId::new(1),
            quantity: Quantity::new(101).unwrap(),
            price_at_purchase: most,
        };
        assert_eq!(
            NewOrder::new(UserId::new(1), OrderStatus::Completed, vec![over]),
            Err(TotalTooLarge)
        );

        let huge = NewOrderLine {
            product_id: ProductId::new(2),
            quantity: Quantity::new(i64::from(i32::MAX)).unwrap(),
            price_at_purchase: most,
        };
        assert_eq!(
            NewOrder::new(UserId::new(1), OrderStatus::Completed, vec![huge, huge]),
            Err(TotalTooLarge)
        );
    }

    #[test]
    fn test_new_order_sorts_lines_by_product() {
        let order = NewOrder::new(
            UserId::new(1),
            OrderStatus::Completed,
            vec![line(9, 1, 100), line(3, 1, 100), line(5, 1, 100)],
        )
        .unwrap();
        let ids: Vec<i32> = order.lines.iter().map(|l| l.product_id.as_i32()).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
