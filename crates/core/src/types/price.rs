//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error constructing a [`Price`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    /// Prices are never negative; a negative amount from the backend is a
    /// data error, not a discount.
    #[error("negative price amount: {0}")]
    Negative(Decimal),
}

/// A non-negative monetary amount in the shop's base currency.
///
/// Uses `rust_decimal::Decimal` to avoid floating-point drift; the backend
/// sends prices as JSON numbers and parsing them through `Decimal` preserves
/// the exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is less than zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// A zero price.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        let err = Price::new(Decimal::new(-100, 2)).unwrap_err();
        assert_eq!(err, PriceError::Negative(Decimal::new(-100, 2)));
    }

    #[test]
    fn test_price_accepts_zero_and_positive() {
        assert_eq!(Price::new(Decimal::ZERO).unwrap(), Price::zero());
        assert!(Price::new(Decimal::new(1999, 2)).is_ok());
    }

    #[test]
    fn test_price_display_two_decimals() {
        let price = Price::new(Decimal::new(1999, 2)).unwrap();
        assert_eq!(price.to_string(), "19.99");

        let whole = Price::new(Decimal::new(5, 0)).unwrap();
        assert_eq!(whole.to_string(), "5.00");
    }

    #[test]
    fn test_price_serde_transparent() {
        let price = Price::new(Decimal::new(450, 1)).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }
}
