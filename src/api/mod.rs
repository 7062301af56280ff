//! HTTP API.
//!
//! Everything under `/api` except login requires a bearer token; each
//! handler checks the caller's capability before touching the store.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod reports;
pub mod sessions;
pub mod settings;
pub mod users;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::infra::{EventPublisher, Store};
use crate::services::{CheckoutProcessor, ReportService};

pub use auth::{AuthKeys, CurrentUser};
pub use error::AppError;
pub use sessions::{CartRegistry, CheckoutLease, SessionKey};

pub const SERVICE_NAME: &str = "opensase-pos";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub carts: CartRegistry,
    pub auth: AuthKeys,
    pub checkout: CheckoutProcessor,
    pub reports: ReportService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: AuthKeys, publisher: EventPublisher, report_top_n: usize) -> Self {
        Self {
            checkout: CheckoutProcessor::new(store.clone(), publisher),
            reports: ReportService::new(store.clone(), report_top_n),
            carts: CartRegistry::new(),
            store,
            auth,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": SERVICE_NAME})) }))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/products/:id", get(catalog::get_product).put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route("/api/cart/items/:id/increment", post(cart::increment))
        .route("/api/cart/items/:id/decrement", post(cart::decrement))
        .route("/api/cart/checkout", post(cart::checkout))
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/reports/sales", get(reports::sales_report))
        .route("/api/dashboard/stats", get(reports::dashboard_stats))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/:id", axum::routing::put(users::update_user).delete(users::delete_user))
        .route("/api/settings", get(settings::get_settings).post(settings::save_settings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn app() -> Router {
        let keys = AuthKeys::new(&SecretString::from("s".repeat(32)), 5);
        build_app(AppState::new(Arc::new(InMemoryStore::new()), keys, EventPublisher::disabled(), 5))
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        for uri in ["/api/products", "/api/cart", "/api/auth/me", "/api/settings"] {
            let response = app().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let request = Request::get("/api/products").header("authorization", "Bearer nope").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
