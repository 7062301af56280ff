//! Order endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::cart::payment_method;
use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::aggregates::Order;
use crate::domain::checkout::{CheckoutRequest, RequestedLine};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<RequestedLine>,
    pub payment_method: Option<String>,
}

/// Checkout from a client-held cart.
pub async fn create_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    current.require(Capability::Sell)?;
    let request = CheckoutRequest {
        user_id: current.user.id,
        payment_method: payment_method(body.payment_method)?,
        lines: body.items,
    };
    let order = state.checkout.checkout(&request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    current.require(Capability::Sell)?;
    Ok(Json(state.store.get_order(id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    current.require(Capability::Administer)?;
    let order = state.checkout.cancel(id).await?;
    tracing::info!(order_id = %id, user_id = %current.user.id, "cancelled by admin");
    Ok(Json(order))
}
