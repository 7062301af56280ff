//! Checkout pricing and stock movement.
//!
//! Pure functions run by every store inside its transaction: the store
//! loads (and locks) the live products, calls [`place_order`] or
//! [`cancel_order`], and persists the returned values only on `Ok`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{BusinessSettings, Order, PricedLine, Product};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::domain::value_objects::PaymentMethod;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub payment_method: PaymentMethod,
    pub lines: Vec<RequestedLine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine { pub product_id: Uuid, pub quantity: u32 }

impl CheckoutRequest {
    /// Reject empty or zero-quantity requests and fold repeated products
    /// into one line, keeping first-seen order.
    pub fn normalized(&self) -> Result<Vec<RequestedLine>, CheckoutRejection> {
        if self.lines.is_empty() { return Err(CheckoutRejection::EmptyCart); }
        let mut merged: Vec<RequestedLine> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.quantity == 0 { return Err(CheckoutRejection::InvalidQuantity { product_id: line.product_id }); }
            match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                Some(m) => m.quantity = m.quantity.saturating_add(line.quantity),
                None => merged.push(*line),
            }
        }
        Ok(merged)
    }

    /// Product ids sorted ascending, the order in which rows are locked.
    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Progress of one checkout attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage { Idle, Validating, Persisting, Committed, Rejected }

impl CheckoutStage {
    /// Legal transitions: Idle→Validating→Persisting→Committed, and
    /// Validating|Persisting→Rejected.
    pub fn advance(self, next: CheckoutStage) -> Option<CheckoutStage> {
        use CheckoutStage::*;
        match (self, next) {
            (Idle, Validating) | (Validating, Persisting) | (Persisting, Committed)
            | (Validating, Rejected) | (Persisting, Rejected) => Some(next),
            _ => None,
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// Why a checkout (or cancellation) was refused. None of these leave a trace
/// in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CheckoutRejection {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Quantity must be positive")]
    InvalidQuantity { product_id: Uuid },
    #[error("Payment method is required")]
    MissingPaymentMethod,
    #[error("Product is no longer available")]
    ProductUnavailable { product_id: Uuid },
    #[error("Not enough stock for {name}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, name: String, requested: u32, available: u32 },
    #[error("A checkout is already in progress")]
    AlreadyInProgress,
    #[error("Order is already cancelled")]
    AlreadyCancelled,
}

impl CheckoutRejection {
    /// Stock conflicts are the caller's signal to refresh the catalog.
    pub fn is_stock_conflict(&self) -> bool {
        matches!(self, Self::InsufficientStock { .. } | Self::ProductUnavailable { .. })
    }
}

/// Everything a store must write for one committed sale.
#[derive(Clone, Debug)]
pub struct Placement {
    pub order: Order,
    pub products: Vec<Product>,
    pub events: Vec<DomainEvent>,
}

pub fn place_order(
    request: &CheckoutRequest,
    mut catalog: HashMap<Uuid, Product>,
    settings: &BusinessSettings,
    now: DateTime<Utc>,
) -> Result<Placement, CheckoutRejection> {
    let lines = request.normalized()?;
    let mut priced = Vec::with_capacity(lines.len());
    let mut events = Vec::with_capacity(lines.len() + 1);
    let mut touched = Vec::with_capacity(lines.len());

    for line in lines {
        let product = catalog.get_mut(&line.product_id)
            .filter(|p| p.active)
            .ok_or(CheckoutRejection::ProductUnavailable { product_id: line.product_id })?;
        product.remove_stock(line.quantity).map_err(|_| CheckoutRejection::InsufficientStock {
            product_id: product.id, name: product.name.clone(), requested: line.quantity, available: product.stock,
        })?;
        priced.push(PricedLine { product_id: product.id, quantity: line.quantity, unit_price: product.price });
        events.push(DomainEvent::Product(ProductEvent::StockDecremented {
            product_id: product.id, quantity: line.quantity, remaining: product.stock,
        }));
        touched.push(product.id);
    }

    let order = Order::place(request.user_id, request.payment_method.clone(), priced, settings.tax_rate, now)
        .map_err(|_| CheckoutRejection::EmptyCart)?;
    events.insert(0, DomainEvent::Order(OrderEvent::Placed { order_id: order.id, user_id: order.user_id, total: order.total_amount }));
    let products = touched.into_iter().filter_map(|id| catalog.remove(&id)).collect();
    Ok(Placement { order, products, events })
}

/// Result of cancelling an order: the updated order and restocked products.
#[derive(Clone, Debug)]
pub struct Cancellation {
    pub order: Order,
    pub products: Vec<Product>,
    pub events: Vec<DomainEvent>,
}

/// Cancel a paid order and put its items back on the shelf. Products that
/// were archived since the sale are restocked all the same.
pub fn cancel_order(mut order: Order, mut catalog: HashMap<Uuid, Product>) -> Result<Cancellation, CheckoutRejection> {
    order.cancel().map_err(|_| CheckoutRejection::AlreadyCancelled)?;
    let mut events = vec![DomainEvent::Order(OrderEvent::Cancelled { order_id: order.id })];
    let mut touched = Vec::new();
    for item in &order.items {
        if let Some(product) = catalog.get_mut(&item.product_id) {
            product.restore_stock(item.quantity);
            events.push(DomainEvent::Product(ProductEvent::StockRestored {
                product_id: product.id, quantity: item.quantity, remaining: product.stock,
            }));
            if !touched.contains(&product.id) { touched.push(product.id); }
        }
    }
    let products = touched.into_iter().filter_map(|id| catalog.remove(&id)).collect();
    Ok(Cancellation { order, products, events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::draft;
    use rust_decimal::Decimal;

    fn catalog(items: &[(&str, i64, u32)]) -> (HashMap<Uuid, Product>, Vec<Uuid>) {
        let products: Vec<Product> = items.iter()
            .map(|(name, cents, stock)| Product::create(draft(name, name, "Café", Decimal::new(*cents, 2), *stock)).unwrap())
            .collect();
        let ids = products.iter().map(|p| p.id).collect();
        (products.into_iter().map(|p| (p.id, p)).collect(), ids)
    }

    fn request(lines: &[(Uuid, u32)]) -> CheckoutRequest {
        CheckoutRequest {
            user_id: Uuid::now_v7(),
            payment_method: PaymentMethod::default(),
            lines: lines.iter().map(|(id, q)| RequestedLine { product_id: *id, quantity: *q }).collect(),
        }
    }

    #[test]
    fn test_place_order_prices_and_decrements() {
        let (products, ids) = catalog(&[("A", 350, 5), ("B", 500, 1)]);
        let placement = place_order(&request(&[(ids[0], 2), (ids[1], 1)]), products, &BusinessSettings::default(), Utc::now()).unwrap();
        assert_eq!(placement.order.total_amount.amount(), Decimal::new(1200, 2));
        let stock: HashMap<Uuid, u32> = placement.products.iter().map(|p| (p.id, p.stock)).collect();
        assert_eq!(stock[&ids[0]], 3);
        assert_eq!(stock[&ids[1]], 0);
        assert_eq!(placement.events.len(), 3);
        assert_eq!(placement.events[0].kind(), "order.placed");
    }

    #[test]
    fn test_rejects_stale_quantity() {
        let (products, ids) = catalog(&[("A", 100, 1)]);
        let err = place_order(&request(&[(ids[0], 2)]), products, &BusinessSettings::default(), Utc::now()).unwrap_err();
        assert!(err.is_stock_conflict());
        assert!(matches!(err, CheckoutRejection::InsufficientStock { requested: 2, available: 1, .. }));
    }

    #[test]
    fn test_rejects_empty_and_unknown() {
        let (products, _) = catalog(&[("A", 100, 1)]);
        let err = place_order(&request(&[]), products.clone(), &BusinessSettings::default(), Utc::now()).unwrap_err();
        assert_eq!(err, CheckoutRejection::EmptyCart);
        let missing = Uuid::now_v7();
        let err = place_order(&request(&[(missing, 1)]), products, &BusinessSettings::default(), Utc::now()).unwrap_err();
        assert_eq!(err, CheckoutRejection::ProductUnavailable { product_id: missing });
    }

    #[test]
    fn test_archived_products_cannot_be_sold() {
        let (mut products, ids) = catalog(&[("A", 100, 3)]);
        products.get_mut(&ids[0]).unwrap().archive();
        let err = place_order(&request(&[(ids[0], 1)]), products, &BusinessSettings::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CheckoutRejection::ProductUnavailable { .. }));
    }

    #[test]
    fn test_duplicate_lines_are_merged_before_stock_check() {
        let (products, ids) = catalog(&[("A", 100, 3)]);
        let err = place_order(&request(&[(ids[0], 2), (ids[0], 2)]), products.clone(), &BusinessSettings::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CheckoutRejection::InsufficientStock { requested: 4, .. }));
        let ok = place_order(&request(&[(ids[0], 1), (ids[0], 2)]), products, &BusinessSettings::default(), Utc::now()).unwrap();
        assert_eq!(ok.order.items.len(), 1);
        assert_eq!(ok.products[0].stock, 0);
    }

    #[test]
    fn test_cancel_restores_stock() {
        let (products, ids) = catalog(&[("A", 350, 5)]);
        let placement = place_order(&request(&[(ids[0], 2)]), products, &BusinessSettings::default(), Utc::now()).unwrap();
        let after_sale: HashMap<Uuid, Product> = placement.products.into_iter().map(|p| (p.id, p)).collect();
        let cancellation = cancel_order(placement.order, after_sale).unwrap();
        assert!(!cancellation.order.is_paid());
        assert_eq!(cancellation.products[0].stock, 5);
        let again = cancel_order(cancellation.order, HashMap::new()).unwrap_err();
        assert_eq!(again, CheckoutRejection::AlreadyCancelled);
    }

    #[test]
    fn test_stage_transitions() {
        use CheckoutStage::*;
        assert_eq!(Idle.advance(Validating), Some(Validating));
        assert_eq!(Validating.advance(Rejected), Some(Rejected));
        assert_eq!(Idle.advance(Committed), None);
        assert_eq!(Committed.advance(Rejected), None);
    }
}
