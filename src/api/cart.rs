//! Register cart endpoints. The cart lives server side, one per login
//! session, and every response carries the recomputed totals.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{AppError, AppState, CurrentUser};
use crate::domain::access::Capability;
use crate::domain::aggregates::{Cart, CartView, Order};
use crate::domain::checkout::CheckoutRejection;
use crate::domain::value_objects::PaymentMethod;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    pub payment_method: Option<String>,
}

/// Absent means the default method; present but blank is refused.
pub fn payment_method(requested: Option<String>) -> Result<PaymentMethod, CheckoutRejection> {
    match requested {
        None => Ok(PaymentMethod::default()),
        Some(label) => PaymentMethod::new(label).ok_or(CheckoutRejection::MissingPaymentMethod),
    }
}

async fn view(state: &AppState, cart: &Cart) -> Result<Json<CartView>, AppError> {
    let settings = state.store.settings().await?;
    Ok(Json(cart.view(settings.tax_rate)))
}

pub async fn get_cart(State(state): State<AppState>, current: CurrentUser) -> Result<Json<CartView>, AppError> {
    current.require(Capability::Sell)?;
    let cart = state.carts.snapshot(current.session_id).await;
    view(&state, &cart).await
}

pub async fn clear_cart(State(state): State<AppState>, current: CurrentUser) -> Result<Json<CartView>, AppError> {
    current.require(Capability::Sell)?;
    let cart = state.carts.update(current.session(), |cart| { cart.clear(); Ok(()) }).await?;
    view(&state, &cart).await
}

pub async fn add_item(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>, AppError> {
    current.require(Capability::Sell)?;
    let product = state.store.get_product(body.product_id).await?;
    let cart = state.carts.update(current.session(), |cart| cart.add_item(&product)).await?;
    view(&state, &cart).await
}

pub async fn increment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    current.require(Capability::Sell)?;
    let cart = state.carts.update(current.session(), |cart| cart.increment(product_id)).await?;
    view(&state, &cart).await
}

pub async fn decrement(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    current.require(Capability::Sell)?;
    let cart = state.carts.update(current.session(), |cart| cart.decrement(product_id)).await?;
    view(&state, &cart).await
}

/// Charge the session cart. On success the cart is emptied; on any
/// failure it is left as it was. The sale runs on its own task so that a
/// dropped request still settles both the order and the cart.
pub async fn checkout(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<Json<CheckoutBody>>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    current.require(Capability::Sell)?;
    let method = payment_method(body.and_then(|Json(b)| b.payment_method))?;
    let (cart, lease) = state.carts.begin_checkout(current.session()).await?;
    let request = cart.to_request(current.user.id, method);
    let processor = state.checkout.clone();
    let order = tokio::spawn(async move {
        let result = processor.checkout(&request).await;
        lease.finish(result.is_ok()).await;
        result
    })
    .await
    .map_err(|e| AppError::Internal(format!("checkout task failed: {e}")))??;
    Ok((StatusCode::CREATED, Json(order)))
}
