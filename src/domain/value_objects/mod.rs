//! Value Objects for the point of sale

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object.
///
/// The shop trades in a single currency (see `BusinessSettings::currency_symbol`),
/// so an amount is just a decimal. Rounding to cents happens only where a
/// fraction is introduced: tax and averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

/// Whole cents at most: `3.50` and `3.5000` qualify, `3.555` does not.
pub fn has_cent_precision(amount: Decimal) -> bool { amount.normalize().scale() <= 2 }

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    /// Largest unit price a product may carry (999 999.99).
    pub const MAX_PRICE: Money = Money(Decimal::from_parts(99_999_999, 0, 0, false, 2));

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn amount(&self) -> Decimal { self.0 }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// Percentage of this amount, rounded to cents.
    pub fn percent(&self, rate: Decimal) -> Money {
        Money(self.0 * rate / Decimal::ONE_HUNDRED).round_cents()
    }

    /// Divide evenly, `None` when dividing by zero.
    pub fn split(&self, parts: u64) -> Option<Money> {
        if parts == 0 { return None; }
        Some(Money(self.0 / Decimal::from(parts)).round_cents())
    }

    pub fn round_cents(self) -> Money {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Mul<u32> for Money {
    type Output = Money;
    fn mul(self, rhs: u32) -> Money { self.multiply(rhs) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Payment method label. No gateway sits behind it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethod(String);

impl PaymentMethod {
    pub const DEFAULT: &'static str = "Efectivo";

    /// Blank labels are rejected.
    pub fn new(label: impl Into<String>) -> Option<Self> {
        let label = label.into().trim().to_string();
        if label.is_empty() { None } else { Some(Self(label)) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for PaymentMethod {
    fn default() -> Self { Self(Self::DEFAULT.to_string()) }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
