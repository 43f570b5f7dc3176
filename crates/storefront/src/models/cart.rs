//! Cart line domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwright_core::{ProductId, Quantity, UserId};

/// One product entry in a user's cart, unique per `(user_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
