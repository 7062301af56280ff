//! Cart Aggregate
//!
//! The in-progress sale of one register session. Each line carries the
//! name, price and stock of the product as they were when the line was
//! created; the stock snapshot bounds further increments without another
//! catalog read. Live stock is checked again at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::order::Totals;
use crate::domain::aggregates::product::Product;
use crate::domain::checkout::{CheckoutRequest, RequestedLine};
use crate::domain::value_objects::{Money, PaymentMethod};

#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: HashMap<Uuid, CartLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub image_url: Option<String>,
    pub stock_at_add: u32,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

/// Cart contents plus totals, as handed to a UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    #[serde(flatten)]
    pub totals: Totals,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> { self.lines.get(&product_id) }

    /// Lines ordered by product name, independent of insertion order.
    pub fn lines(&self) -> Vec<&CartLine> {
        let mut lines: Vec<&CartLine> = self.lines.values().collect();
        lines.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        lines
    }

    pub fn add_item(&mut self, product: &Product) -> Result<(), CartError> {
        if !product.is_in_stock() {
            return Err(CartError::OutOfStock { name: product.name.clone() });
        }
        if self.lines.contains_key(&product.id) {
            return self.increment(product.id);
        }
        self.lines.insert(product.id, CartLine {
            product_id: product.id, name: product.name.clone(), unit_price: product.price,
            image_url: product.image_url.clone(), stock_at_add: product.stock, quantity: 1,
        });
        Ok(())
    }

    pub fn increment(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let line = self.lines.get_mut(&product_id).ok_or(CartError::ItemNotFound)?;
        if line.quantity >= line.stock_at_add {
            return Err(CartError::MaxStockReached { stock: line.stock_at_add });
        }
        line.quantity += 1;
        Ok(())
    }

    /// Lines that drop to zero are removed, never kept at zero.
    pub fn decrement(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let line = self.lines.get_mut(&product_id).ok_or(CartError::ItemNotFound)?;
        line.quantity -= 1;
        if line.quantity == 0 { self.lines.remove(&product_id); }
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    pub fn subtotal(&self) -> Money { self.lines.values().map(CartLine::line_total).sum() }
    pub fn tax_amount(&self, tax_rate: Decimal) -> Money { self.totals(tax_rate).tax_amount }
    pub fn total(&self, tax_rate: Decimal) -> Money { self.totals(tax_rate).total }
    pub fn totals(&self, tax_rate: Decimal) -> Totals { Totals::compute(self.subtotal(), tax_rate) }

    pub fn view(&self, tax_rate: Decimal) -> CartView {
        CartView { lines: self.lines().into_iter().cloned().collect(), totals: self.totals(tax_rate) }
    }

    pub fn to_request(&self, user_id: Uuid, payment_method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            user_id,
            payment_method,
            lines: self.lines().into_iter()
                .map(|l| RequestedLine { product_id: l.product_id, quantity: l.quantity })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("{name} is out of stock")]
    OutOfStock { name: String },
    #[error("Maximum stock ({stock}) reached")]
    MaxStockReached { stock: u32 },
    #[error("Item not found in cart")]
    ItemNotFound,
}
