//! In-memory store.
//!
//! All state sits behind one async mutex, so every operation (checkout
//! included) is serialized. Mutations are computed on copies and written
//! back only when they succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ProductFilter, Store, StoreError};
use crate::domain::aggregates::{BusinessSettings, Order, Product, User};
use crate::domain::checkout::{self, Cancellation, CheckoutRequest, Placement};
use crate::domain::reporting::{ItemRecord, OrderRecord};

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    users: HashMap<Uuid, User>,
    orders: Vec<Order>,
    settings: BusinessSettings,
}

impl State {
    fn snapshot(&self, ids: &[Uuid]) -> HashMap<Uuid, Product> {
        ids.iter().filter_map(|id| self.products.get(id)).map(|p| (p.id, p.clone())).collect()
    }

    fn write_back(&mut self, products: Vec<Product>) {
        for product in products { self.products.insert(product.id, product); }
    }

    fn sku_taken(&self, product: &Product) -> bool {
        self.products.values().any(|p| p.id != product.id && p.sku == product.sku)
    }

    fn email_taken(&self, user: &User) -> bool {
        self.users.values().any(|u| u.id != user.id && u.email == user.email)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_settings(settings: BusinessSettings) -> Self {
        Self { state: Mutex::new(State { settings, ..State::default() }) }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().filter(|p| filter.matches(p)).cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Product, StoreError> {
        let state = self.state.lock().await;
        state.products.get(&id).filter(|p| p.active).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.sku_taken(product) { return Err(StoreError::Conflict(format!("SKU {} already exists", product.sku))); }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.get(&product.id).is_some_and(|p| p.active) { return Err(StoreError::NotFound); }
        if state.sku_taken(product) { return Err(StoreError::Conflict(format!("SKU {} already exists", product.sku))); }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn archive_product(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).filter(|p| p.active).ok_or(StoreError::NotFound)?;
        product.archive();
        Ok(())
    }

    async fn count_low_stock(&self, threshold: u32) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.products.values().filter(|p| p.active && p.is_low_stock(threshold)).count() as u64)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        self.state.lock().await.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.email_taken(user) { return Err(StoreError::Conflict(format!("email {} already registered", user.email))); }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user.id) { return Err(StoreError::NotFound); }
        if state.email_taken(user) { return Err(StoreError::Conflict(format!("email {} already registered", user.email))); }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) { return Err(StoreError::NotFound); }
        if state.orders.iter().any(|o| o.user_id == id) {
            return Err(StoreError::Conflict("user has recorded sales; deactivate instead".to_string()));
        }
        state.users.remove(&id);
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.users.len() as u64)
    }

    async fn settings(&self) -> Result<BusinessSettings, StoreError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn save_settings(&self, settings: &BusinessSettings) -> Result<(), StoreError> {
        self.state.lock().await.settings = settings.clone();
        Ok(())
    }

    async fn place_order(&self, request: &CheckoutRequest) -> Result<Placement, StoreError> {
        let mut state = self.state.lock().await;
        let catalog = state.snapshot(&request.product_ids());
        let placement = checkout::place_order(request, catalog, &state.settings, Utc::now())?;
        state.write_back(placement.products.clone());
        state.orders.push(placement.order.clone());
        Ok(placement)
    }

    async fn cancel_order(&self, id: Uuid) -> Result<Cancellation, StoreError> {
        let mut state = self.state.lock().await;
        let index = state.orders.iter().position(|o| o.id == id).ok_or(StoreError::NotFound)?;
        let order = state.orders[index].clone();
        let ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
        let catalog = state.snapshot(&ids);
        let cancellation = checkout::cancel_order(order, catalog)?;
        state.write_back(cancellation.products.clone());
        state.orders[index] = cancellation.order.clone();
        Ok(cancellation)
    }

    async fn get_order(&self, id: Uuid) -> Result<Order, StoreError> {
        self.state.lock().await.orders.iter().find(|o| o.id == id).cloned().ok_or(StoreError::NotFound)
    }

    async fn order_records(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<OrderRecord>, StoreError> {
        let state = self.state.lock().await;
        state.orders.iter()
            .filter(|o| o.created_at >= from && o.created_at < until)
            .map(|order| {
                let items = order.items.iter().map(|item| {
                    let product = state.products.get(&item.product_id).ok_or_else(|| {
                        StoreError::DataCorruption(format!("order {} references missing product {}", order.id, item.product_id))
                    })?;
                    Ok(ItemRecord {
                        product_id: item.product_id, product_name: product.name.clone(), category: product.category.clone(),
                        quantity: item.quantity, price_at_purchase: item.price_at_purchase,
                    })
                }).collect::<Result<Vec<_>, StoreError>>()?;
                Ok(OrderRecord {
                    id: order.id, created_at: order.created_at, status: order.status, total_amount: order.total_amount,
                    cashier: state.users.get(&order.user_id).map(|u| u.display_name().to_string()),
                    items,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::draft;
    use crate::domain::checkout::{CheckoutRejection, RequestedLine};
    use crate::domain::value_objects::PaymentMethod;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    async fn seeded(stock: u32) -> (Arc<InMemoryStore>, Product) {
        let store = Arc::new(InMemoryStore::new());
        let product = Product::create(draft("ESP-1", "Espresso", "Café", Decimal::new(250, 2), stock)).unwrap();
        store.insert_product(&product).await.unwrap();
        (store, product)
    }

    fn request(product_id: Uuid, quantity: u32) -> CheckoutRequest {
        CheckoutRequest { user_id: Uuid::now_v7(), payment_method: PaymentMethod::default(), lines: vec![RequestedLine { product_id, quantity }] }
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let (store, _) = seeded(1).await;
        let clash = Product::create(draft("esp-1", "Otro", "Café", Decimal::ONE, 1)).unwrap();
        assert!(matches!(store.insert_product(&clash).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejected_checkout_leaves_store_untouched() {
        let (store, product) = seeded(1).await;
        let err = store.place_order(&request(product.id, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(CheckoutRejection::InsufficientStock { .. })));
        assert_eq!(store.get_product(product.id).await.unwrap().stock, 1);
        assert!(store.order_records(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_for_last_unit() {
        let (store, product) = seeded(1).await;
        let (a, b) = tokio::join!(
            { let s = store.clone(); let r = request(product.id, 1); async move { s.place_order(&r).await } },
            { let s = store.clone(); let r = request(product.id, 1); async move { s.place_order(&r).await } },
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a.err().or(b.err()), Some(StoreError::Rejected(CheckoutRejection::InsufficientStock { .. }))));
        assert_eq!(store.get_product(product.id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_cancel_restocks() {
        let (store, product) = seeded(3).await;
        let placement = store.place_order(&request(product.id, 2)).await.unwrap();
        store.cancel_order(placement.order.id).await.unwrap();
        assert_eq!(store.get_product(product.id).await.unwrap().stock, 3);
        assert!(matches!(store.cancel_order(placement.order.id).await, Err(StoreError::Rejected(CheckoutRejection::AlreadyCancelled))));
    }

    #[tokio::test]
    async fn test_archived_products_are_hidden() {
        let (store, product) = seeded(3).await;
        store.archive_product(product.id).await.unwrap();
        assert!(store.list_products(&ProductFilter::default()).await.unwrap().is_empty());
        assert!(matches!(store.get_product(product.id).await, Err(StoreError::NotFound)));
    }
}
