//! Product catalog endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::aggregates::{Product, ProductDraft};
use crate::infra::ProductFilter;

pub async fn list_products(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.store.list_products(&filter).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.store.get_product(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    current.require(Capability::ManageInventory)?;
    draft.validate()?;
    let product = Product::create(draft)?;
    state.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, sku = %product.sku, user_id = %current.user.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppError> {
    current.require(Capability::ManageInventory)?;
    draft.validate()?;
    let mut product = state.store.get_product(id).await?;
    product.apply(draft)?;
    state.store.update_product(&product).await?;
    tracing::info!(product_id = %id, stock = product.stock, "product updated");
    Ok(Json(product))
}

/// Archives the product; past orders keep referring to it.
pub async fn delete_product(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    current.require(Capability::ManageInventory)?;
    state.store.archive_product(id).await?;
    tracing::info!(product_id = %id, "product archived");
    Ok(StatusCode::NO_CONTENT)
}
