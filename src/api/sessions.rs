//! Per-session carts.
//!
//! One cart per login session (the token's `sid`). The registry lock is
//! never held across a store call: checkout takes a [`CheckoutLease`],
//! releases the lock, and settles the lease afterwards. Sessions whose
//! token has expired are evicted on the next registry access.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError};
use crate::domain::checkout::CheckoutRejection;

/// A login session as carried by its access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionKey {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionCart {
    cart: Cart,
    checkout_in_flight: bool,
    expires_at: DateTime<Utc>,
}

impl SessionCart {
    fn new(expires_at: DateTime<Utc>) -> Self { Self { cart: Cart::new(), checkout_in_flight: false, expires_at } }
}

type Sessions = HashMap<Uuid, SessionCart>;

fn prune(sessions: &mut Sessions, now: DateTime<Utc>) {
    let before = sessions.len();
    sessions.retain(|_, s| s.expires_at > now);
    if sessions.len() < before {
        tracing::debug!(evicted = before - sessions.len(), "expired session carts evicted");
    }
}

fn entry(sessions: &mut Sessions, session: SessionKey) -> &mut SessionCart {
    prune(sessions, Utc::now());
    sessions.entry(session.id).or_insert_with(|| SessionCart::new(session.expires_at))
}

/// Why a cart operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartRefusal {
    Cart(CartError),
    Checkout(CheckoutRejection),
}

impl From<CartError> for CartRefusal {
    fn from(err: CartError) -> Self { Self::Cart(err) }
}

#[derive(Clone, Debug, Default)]
pub struct CartRegistry {
    sessions: Arc<Mutex<Sessions>>,
}

impl CartRegistry {
    pub fn new() -> Self { Self::default() }

    pub async fn snapshot(&self, session_id: Uuid) -> Cart {
        let mut sessions = self.sessions.lock().await;
        prune(&mut sessions, Utc::now());
        sessions.get(&session_id).map(|s| s.cart.clone()).unwrap_or_default()
    }

    /// Number of live sessions holding a cart.
    pub async fn session_count(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        prune(&mut sessions, Utc::now());
        sessions.len()
    }

    /// Apply `edit` to the session's cart and return the result. Refused
    /// while a checkout for the session is in flight.
    pub async fn update<F>(&self, session: SessionKey, edit: F) -> Result<Cart, CartRefusal>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError>,
    {
        let mut sessions = self.sessions.lock().await;
        let entry = entry(&mut sessions, session);
        if entry.checkout_in_flight {
            return Err(CartRefusal::Checkout(CheckoutRejection::AlreadyInProgress));
        }
        edit(&mut entry.cart)?;
        Ok(entry.cart.clone())
    }

    /// Mark the cart in flight and hand back what is to be charged, with
    /// the lease that releases it.
    pub async fn begin_checkout(&self, session: SessionKey) -> Result<(Cart, CheckoutLease), CheckoutRejection> {
        let mut sessions = self.sessions.lock().await;
        let entry = entry(&mut sessions, session);
        if entry.checkout_in_flight { return Err(CheckoutRejection::AlreadyInProgress); }
        if entry.cart.is_empty() { return Err(CheckoutRejection::EmptyCart); }
        entry.checkout_in_flight = true;
        let lease = CheckoutLease { registry: Some(self.clone()), session_id: session.id };
        Ok((entry.cart.clone(), lease))
    }

    async fn settle(&self, session_id: Uuid, committed: bool) {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(&session_id) {
            entry.checkout_in_flight = false;
            if committed { entry.cart.clear(); }
        }
    }

    pub async fn drop_session(&self, session_id: Uuid) {
        self.sessions.lock().await.remove(&session_id);
    }
}

/// A session's checkout slot. `finish` settles it; dropping it unsettled
/// releases the slot and keeps the cart.
#[derive(Debug)]
pub struct CheckoutLease {
    registry: Option<CartRegistry>,
    session_id: Uuid,
}

impl CheckoutLease {
    /// Release the slot; a committed sale also empties the cart.
    pub async fn finish(mut self, committed: bool) {
        if let Some(registry) = self.registry.take() {
            registry.settle(self.session_id, committed).await;
        }
    }
}

impl Drop for CheckoutLease {
    fn drop(&mut self) {
        let Some(registry) = self.registry.take() else { return };
        let session_id = self.session_id;
        tracing::warn!(%session_id, "checkout abandoned; releasing the cart");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => { handle.spawn(async move { registry.settle(session_id, false).await }); }
            Err(_) => {
                if let Ok(mut sessions) = registry.sessions.try_lock() {
                    if let Some(entry) = sessions.get_mut(&session_id) { entry.checkout_in_flight = false; }
                }
            }
        }
    }
}
