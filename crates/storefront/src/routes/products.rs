//! Catalog routes: public browsing and admin CRUD.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use cartwright_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Search query string.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keyword: String,
}

/// Admin listing query string.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
}

impl From<PageQuery> for ProductFilter {
    fn from(page: PageQuery) -> Self {
        Self {
            skip: page.skip,
            limit: page.limit.unwrap_or(0),
            ..Self::default()
        }
    }
}

/// GET /products
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogService::new(state.store()).list(filter).await?;
    Ok(Json(products))
}

/// GET /products/search?keyword=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogService::new(state.store())
        .search(&query.keyword)
        .await?;
    Ok(Json(products))
}

/// GET /products/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = CatalogService::new(state.store()).get(id).await?;
    Ok(Json(product))
}

/// GET /products/admin/{id}
pub async fn admin_show(
    RequireAdmin(_admin): RequireAdmin,
    state: State<AppState>,
    id: Path<ProductId>,
) -> Result<Json<Product>> {
    show(state, id).await
}

/// GET /products/admin
pub async fn admin_index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogService::new(state.store())
        .list(page.into())
        .await?;
    Ok(Json(products))
}

/// POST /products/admin
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.store())
        .create(admin.user_id, new)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/admin/{id}
pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    let product = CatalogService::new(state.store())
        .update(id, update)
        .await?;
    Ok(Json(product))
}

/// DELETE /products/admin/{id}
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    CatalogService::new(state.store()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
