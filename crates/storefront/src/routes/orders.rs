//! Order routes: checkout, history, detail.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use cartwright_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::models::{Order, OrderSummary};
use crate::services::checkout::CheckoutEngine;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// POST /orders/checkout
pub async fn checkout(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = CheckoutEngine::new(state.store()).checkout(&customer).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
pub async fn index(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderSummary>>> {
    let orders = OrderService::new(state.store())
        .history(customer.user_id)
        .await?;
    Ok(Json(orders))
}

/// GET /orders/{id}
pub async fn show(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.store())
        .detail(customer.user_id, id)
        .await?;
    Ok(Json(order))
}
