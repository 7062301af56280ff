//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::value_objects::{has_cent_precision, Money, Sku};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: Sku,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/edit form for a product, validated before it reaches the store.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 50, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "category is required"))]
    pub category: String,
    #[validate(custom = "valid_price")]
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[validate(url)]
    pub image_url: Option<String>,
}

fn valid_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO { return Err(ValidationError::new("price_must_be_positive")); }
    if *price > Money::MAX_PRICE.amount() { return Err(ValidationError::new("price_too_large")); }
    if !has_cent_precision(*price) { return Err(ValidationError::new("price_has_fractional_cents")); }
    Ok(())
}

fn checked_sku(draft: &ProductDraft) -> Result<Sku, ProductError> {
    Sku::new(draft.sku.as_str()).map_err(|_| ProductError::InvalidSku)
}

fn checked_price(draft: &ProductDraft) -> Result<Money, ProductError> {
    valid_price(&draft.price).map(|_| Money::new(draft.price)).map_err(|_| ProductError::InvalidPrice)
}

impl ProductDraft {
    /// Blank image URLs coming from a form are treated as absent.
    pub fn normalized(mut self) -> Self {
        self.image_url = self.image_url.filter(|url| !url.trim().is_empty());
        self.name = self.name.trim().to_string();
        self.category = self.category.trim().to_string();
        self
    }
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, ProductError> {
        let draft = draft.normalized();
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), sku: checked_sku(&draft)?, price: checked_price(&draft)?,
            name: draft.name, category: draft.category, stock: draft.stock, image_url: draft.image_url,
            active: true, created_at: now, updated_at: now,
        })
    }

    /// Overwrite the editable fields from a draft.
    pub fn apply(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        let draft = draft.normalized();
        self.sku = checked_sku(&draft)?;
        self.price = checked_price(&draft)?;
        self.name = draft.name;
        self.category = draft.category;
        self.stock = draft.stock;
        self.image_url = draft.image_url;
        self.touch();
        Ok(())
    }

    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
    pub fn is_low_stock(&self, threshold: u32) -> bool { self.stock <= threshold }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.checked_sub(qty).ok_or(ProductError::InsufficientStock { available: self.stock })?;
        self.touch();
        Ok(())
    }

    pub fn restore_stock(&mut self, qty: u32) {
        self.stock = self.stock.saturating_add(qty);
        self.touch();
    }

    pub fn archive(&mut self) { self.active = false; self.touch(); }

    /// Case-insensitive match against name or SKU.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.sku.as_str().to_lowercase().contains(&term)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Invalid SKU")]
    InvalidSku,
    #[error("Price must be positive, in whole cents and at most 999999.99")]
    InvalidPrice,
    #[error("Insufficient stock ({available} available)")]
    InsufficientStock { available: u32 },
}

#[cfg(test)]
pub(crate) fn draft(sku: &str, name: &str, category: &str, price: Decimal, stock: u32) -> ProductDraft {
    ProductDraft { sku: sku.into(), name: name.into(), category: category.into(), price, stock, image_url: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_product_create() {
        let p = Product::create(draft("lat-01", "Latte", "Café", Decimal::new(350, 2), 4)).unwrap();
        assert_eq!(p.sku.as_str(), "LAT-01");
        assert!(p.active);
    }
    #[test]
    fn test_rejects_non_positive_price() {
        assert_eq!(Product::create(draft("X", "X", "X", Decimal::ZERO, 1)), Err(ProductError::InvalidPrice));
        assert!(draft("X", "X", "X", Decimal::ZERO, 1).validate().is_err());
    }
    #[test]
    fn test_rejects_fractional_cents_and_oversized_price() {
        let fractional = draft("X", "X", "X", Decimal::new(3555, 3), 1);
        assert!(fractional.validate().is_err());
        assert_eq!(Product::create(fractional), Err(ProductError::InvalidPrice));

        let huge = draft("X", "X", "X", Decimal::new(1, 0) * Decimal::from(10_000_000_000_000u64), 1);
        assert!(huge.validate().is_err());
        assert_eq!(Product::create(huge), Err(ProductError::InvalidPrice));

        assert!(draft("X", "X", "X", Money::MAX_PRICE.amount(), 1).validate().is_ok());
        assert!(draft("X", "X", "X", Decimal::new(35000, 4), 1).validate().is_ok());
    }
    #[test]
    fn test_stock() {
        let mut p = Product::create(draft("TEST", "P", "C", Decimal::TEN, 5)).unwrap();
        p.remove_stock(5).unwrap();
        assert!(!p.is_in_stock());
        assert_eq!(p.remove_stock(1), Err(ProductError::InsufficientStock { available: 0 }));
        p.restore_stock(2);
        assert_eq!(p.stock, 2);
    }
    #[test]
    fn test_search_matches_name_or_sku() {
        let p = Product::create(draft("CAP-2", "Capuchino", "Café", Decimal::TEN, 1)).unwrap();
        assert!(p.matches("capu"));
        assert!(p.matches("cap-2"));
        assert!(!p.matches("té"));
    }
}
