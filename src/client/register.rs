//! Register state: the session, the local cart and the current view.
//!
//! The cart here is client-held and is sent whole on checkout through
//! `POST /api/orders`; the server re-prices it against live stock.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{ApiClient, ClientError, Session};
use crate::domain::access::{Access, View};
use crate::domain::aggregates::{BusinessSettings, Cart, CartError, CartView, Order, Product};
use crate::domain::value_objects::PaymentMethod;
use crate::infra::ProductFilter;

#[derive(Debug, Default)]
struct State {
    session: Option<Session>,
    settings: BusinessSettings,
    cart: Cart,
    payment_method: PaymentMethod,
    view: View,
}

pub struct Register {
    api: ApiClient,
    state: Mutex<State>,
    busy: AtomicBool,
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

impl Register {
    pub fn new(api: ApiClient) -> Self {
        Self { api, state: Mutex::new(State::default()), busy: AtomicBool::new(false) }
    }

    pub fn is_busy(&self) -> bool { self.busy.load(Ordering::Acquire) }

    fn enter(&self) -> Result<BusyGuard<'_>, ClientError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| ClientError::Busy)
    }

    async fn session(&self) -> Result<Session, ClientError> {
        self.state.lock().await.session.clone().ok_or(ClientError::NotSignedIn)
    }

    /// A refused token ends the session; any other error passes through.
    async fn settle<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthorized) = &result {
            let mut state = self.state.lock().await;
            state.session = None;
            state.view = View::Login;
        }
        result
    }

    // =========================================================================
    // Session & navigation
    // =========================================================================

    /// Sign in and land on the role's home view.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<View, ClientError> {
        let session = self.api.login(email, password).await?;
        let settings = self.api.settings(&session).await?;
        let mut state = self.state.lock().await;
        state.view = session.access().home();
        state.session = Some(session);
        state.settings = settings;
        state.cart.clear();
        state.payment_method = PaymentMethod::default();
        Ok(state.view)
    }

    pub async fn sign_out(&self) {
        let session = self.state.lock().await.session.take();
        if let Some(session) = session {
            if let Err(e) = self.api.logout(&session).await {
                tracing::debug!(error = %e, "logout request failed");
            }
        }
        let mut state = self.state.lock().await;
        state.cart.clear();
        state.view = View::Login;
    }

    pub async fn access(&self) -> Access {
        self.state.lock().await.session.as_ref().map(Session::access).unwrap_or_else(Access::anonymous)
    }

    pub async fn view(&self) -> View { self.state.lock().await.view }

    /// Go to `view` if the role allows it, otherwise to the role's home.
    pub async fn navigate(&self, view: View) -> View {
        let mut state = self.state.lock().await;
        let access = state.session.as_ref().map(Session::access).unwrap_or_else(Access::anonymous);
        state.view = access.admit(view);
        state.view
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ClientError> {
        let session = self.session().await?;
        let result = self.api.products(&session, filter).await;
        self.settle(result).await
    }

    pub async fn refresh_settings(&self) -> Result<BusinessSettings, ClientError> {
        let session = self.session().await?;
        let result = self.api.settings(&session).await;
        let settings = self.settle(result).await?;
        self.state.lock().await.settings = settings.clone();
        Ok(settings)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub async fn add(&self, product: &Product) -> Result<CartView, CartError> {
        let mut state = self.state.lock().await;
        state.cart.add_item(product)?;
        Ok(state.cart.view(state.settings.tax_rate))
    }

    pub async fn increment(&self, product_id: uuid::Uuid) -> Result<CartView, CartError> {
        let mut state = self.state.lock().await;
        state.cart.increment(product_id)?;
        Ok(state.cart.view(state.settings.tax_rate))
    }

    pub async fn decrement(&self, product_id: uuid::Uuid) -> Result<CartView, CartError> {
        let mut state = self.state.lock().await;
        state.cart.decrement(product_id)?;
        Ok(state.cart.view(state.settings.tax_rate))
    }

    pub async fn clear(&self) {
        self.state.lock().await.cart.clear();
    }

    pub async fn cart(&self) -> CartView {
        let state = self.state.lock().await;
        state.cart.view(state.settings.tax_rate)
    }

    /// Returns false (and keeps the current method) for a blank label.
    pub async fn set_payment_method(&self, label: &str) -> bool {
        match PaymentMethod::new(label) {
            Some(method) => { self.state.lock().await.payment_method = method; true }
            None => false,
        }
    }

    pub async fn payment_method(&self) -> PaymentMethod { self.state.lock().await.payment_method.clone() }

    /// Submit the cart. While a checkout is in flight further calls fail
    /// with `Busy`. On success the cart is emptied and the payment method
    /// goes back to the default; on failure both are kept.
    pub async fn checkout(&self) -> Result<Order, ClientError> {
        let _guard = self.enter()?;
        let (session, lines, method) = {
            let state = self.state.lock().await;
            let session = state.session.clone().ok_or(ClientError::NotSignedIn)?;
            if state.cart.is_empty() {
                return Err(ClientError::Validation("The cart is empty".to_string()));
            }
            let request = state.cart.to_request(session.user().id, state.payment_method.clone());
            (session, request.lines, request.payment_method)
        };

        let result = self.api.create_order(&session, &lines, method.as_str()).await;
        let order = self.settle(result).await?;
        let mut state = self.state.lock().await;
        state.cart.clear();
        state.payment_method = PaymentMethod::default();
        tracing::info!(order_id = %order.id, total = %order.total_amount, "sale completed");
        Ok(order)
    }
}
