//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::sessions::CartRefusal;
use crate::domain::aggregates::{CartError, ProductError};
use crate::domain::checkout::CheckoutRejection;
use crate::domain::reporting::ReportError;
use crate::infra::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Checkout(#[from] CheckoutRejection),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("{0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self { Self::BadRequest(err.to_string()) }
}

impl From<CartRefusal> for AppError {
    fn from(refusal: CartRefusal) -> Self {
        match refusal {
            CartRefusal::Cart(err) => Self::Cart(err),
            CartRefusal::Checkout(rejection) => Self::Checkout(rejection),
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Store(StoreError::NotFound) | Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            Self::Store(StoreError::Rejected(rejection)) | Self::Checkout(rejection) => rejection_status(rejection),
            Self::Store(StoreError::Database(_) | StoreError::DataCorruption(_)) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            Self::Cart(CartError::ItemNotFound) => (StatusCode::NOT_FOUND, "item_not_found"),
            Self::Cart(CartError::OutOfStock { .. }) => (StatusCode::CONFLICT, "out_of_stock"),
            Self::Cart(CartError::MaxStockReached { .. }) => (StatusCode::CONFLICT, "max_stock_reached"),
            Self::Product(ProductError::InsufficientStock { .. }) => (StatusCode::CONFLICT, "insufficient_stock"),
            Self::Product(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        }
    }
}

fn rejection_status(rejection: &CheckoutRejection) -> (StatusCode, &'static str) {
    match rejection {
        CheckoutRejection::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart"),
        CheckoutRejection::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, "invalid_quantity"),
        CheckoutRejection::MissingPaymentMethod => (StatusCode::BAD_REQUEST, "missing_payment_method"),
        CheckoutRejection::ProductUnavailable { .. } => (StatusCode::CONFLICT, "product_unavailable"),
        CheckoutRejection::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        CheckoutRejection::AlreadyInProgress => (StatusCode::CONFLICT, "checkout_in_progress"),
        CheckoutRejection::AlreadyCancelled => (StatusCode::CONFLICT, "already_cancelled"),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": code, "message": message.into() }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Don't expose internal error details to clients
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            match &self {
                Self::Store(StoreError::NotFound) => "Not found".to_string(),
                Self::Store(StoreError::Conflict(detail)) => detail.clone(),
                _ => self.to_string(),
            }
        };

        json_error(status, code, message)
    }
}
