//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, PaymentMethod};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem { pub id: Uuid, pub order_id: Uuid, pub product_id: Uuid, pub quantity: u32, pub price_at_purchase: Money }

impl OrderItem {
    pub fn line_total(&self) -> Money { self.price_at_purchase.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Paid, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Paid => "paid", Self::Cancelled => "cancelled" }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Subtotal, tax and total of a sale.
///
/// The one formula used both for what the cart displays and for what an
/// order records: `total = subtotal + round(subtotal * tax_rate / 100)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl Totals {
    pub fn compute(subtotal: Money, tax_rate: Decimal) -> Self {
        let tax_amount = subtotal.percent(tax_rate);
        Self { subtotal, tax_amount, total: subtotal + tax_amount }
    }
}

/// Line handed to [`Order::place`]: product, quantity and the price charged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedLine { pub product_id: Uuid, pub quantity: u32, pub unit_price: Money }

impl Order {
    pub fn place(
        user_id: Uuid,
        payment_method: PaymentMethod,
        lines: Vec<PricedLine>,
        tax_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        if lines.iter().any(|l| l.quantity == 0) { return Err(OrderError::InvalidQuantity); }
        let id = Uuid::now_v7();
        let items: Vec<OrderItem> = lines.into_iter().map(|l| OrderItem {
            id: Uuid::now_v7(), order_id: id, product_id: l.product_id, quantity: l.quantity, price_at_purchase: l.unit_price,
        }).collect();
        let totals = Totals::compute(items.iter().map(OrderItem::line_total).sum(), tax_rate);
        Ok(Self {
            id, created_at: now, status: OrderStatus::Paid, payment_method,
            subtotal: totals.subtotal, tax_amount: totals.tax_amount, total_amount: totals.total,
            user_id, items,
        })
    }

    pub fn is_paid(&self) -> bool { self.status == OrderStatus::Paid }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::AlreadyCancelled); }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Order item quantity must be positive")]
    InvalidQuantity,
    #[error("Order is already cancelled")]
    AlreadyCancelled,
    #[error("Unknown order status {0:?}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> PricedLine {
        PricedLine { product_id: Uuid::now_v7(), quantity, unit_price: Money::new(Decimal::new(price, 2)) }
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(Uuid::now_v7(), PaymentMethod::default(), vec![line(350, 2), line(500, 1)], Decimal::ZERO, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total_amount.amount(), Decimal::new(1200, 2));
        assert!(order.items.iter().all(|i| i.order_id == order.id));
        order.cancel().unwrap();
        assert_eq!(order.cancel(), Err(OrderError::AlreadyCancelled));
    }

    #[test]
    fn test_order_applies_tax() {
        let order = Order::place(Uuid::now_v7(), PaymentMethod::default(), vec![line(1000, 1)], Decimal::new(12, 0), Utc::now()).unwrap();
        assert_eq!(order.tax_amount.amount(), Decimal::new(120, 2));
        assert_eq!(order.total_amount.amount(), Decimal::new(1120, 2));
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = Order::place(Uuid::now_v7(), PaymentMethod::default(), vec![], Decimal::ZERO, Utc::now());
        assert_eq!(result, Err(OrderError::NoItems));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("Pagada".parse::<OrderStatus>().is_err());
    }
}
