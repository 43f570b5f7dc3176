//! Cart routes. Every mutation answers with the re-priced cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use cartwright_core::{ProductId, Quantity};

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::services::cart::{CartError, CartService, CartView};
use crate::state::AppState;

/// Add-to-cart request body.
///
/// `quantity` is taken as a raw integer so out-of-range values surface as a
/// cart error rather than a body rejection.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Set-quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// GET /cart
pub async fn show(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store()).view(customer.user_id).await?;
    Ok(Json(view))
}

/// POST /cart
pub async fn add(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.store());
    let quantity = Quantity::new(req.quantity).map_err(CartError::from)?;
    cart.add(customer.user_id, req.product_id, quantity).await?;
    Ok(Json(cart.view(customer.user_id).await?))
}

/// PUT /cart/{product_id}
pub async fn update(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.store());
    let quantity = Quantity::new(req.quantity).map_err(CartError::from)?;
    cart.update(customer.user_id, product_id, quantity).await?;
    Ok(Json(cart.view(customer.user_id).await?))
}

/// DELETE /cart/{product_id}
pub async fn remove(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.store());
    cart.remove(customer.user_id, product_id).await?;
    Ok(Json(cart.view(customer.user_id).await?))
}
