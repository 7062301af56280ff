//! Business settings (singleton)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::domain::value_objects::has_cent_precision;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BusinessSettings {
    #[validate(length(min = 1, max = 200))]
    pub business_name: String,
    pub tax_id: Option<String>,
    /// Percentage, e.g. `12` for 12 %.
    #[validate(custom = "tax_rate_range")]
    pub tax_rate: Decimal,
    #[validate(length(min = 1, max = 8))]
    pub currency_symbol: String,
    pub low_stock_threshold: u32,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        Self {
            business_name: "Café Sol".to_string(),
            tax_id: None,
            tax_rate: Decimal::ZERO,
            currency_symbol: "$".to_string(),
            low_stock_threshold: 10,
        }
    }
}

fn tax_rate_range(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate > Decimal::ONE_HUNDRED { return Err(ValidationError::new("tax_rate_out_of_range")); }
    if !has_cent_precision(*rate) { return Err(ValidationError::new("tax_rate_too_precise")); }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_charge_no_tax() {
        let settings = BusinessSettings::default();
        assert_eq!(settings.tax_rate, Decimal::ZERO);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_tax_rate_bounds() {
        let settings = BusinessSettings { tax_rate: Decimal::new(101, 0), ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_tax_rate_has_at_most_two_decimals() {
        let precise = BusinessSettings { tax_rate: Decimal::new(12125, 3), ..Default::default() };
        assert!(precise.validate().is_err());
        let fine = BusinessSettings { tax_rate: Decimal::new(1250, 2), ..Default::default() };
        assert!(fine.validate().is_ok());
    }
}
