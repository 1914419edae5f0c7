//! Value objects for the order domain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DomainError, Result};

/// A monetary amount in a given currency.
///
/// The value is a decimal so that repeated arithmetic never drifts. It
/// serializes as a string and deserializes from either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub currency: String,
    pub value: Decimal,
}

impl Money {
    pub fn new(currency: impl Into<String>, value: Decimal) -> Self {
        Self {
            currency: currency.into(),
            value,
        }
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(currency, Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Adds another amount in the same currency.
    pub fn add(&self, other: &Money) -> Result<Money> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            });
        }
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| DomainError::AmountOverflow {
                operation: "add",
                currency: self.currency.clone(),
            })?;
        Ok(Money::new(self.currency.clone(), value))
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: i64) -> Result<Money> {
        let value = self
            .value
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| DomainError::AmountOverflow {
                operation: "multiply",
                currency: self.currency.clone(),
            })?;
        Ok(Money::new(self.currency.clone(), value))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// A postal address used for shipping and billing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip_code: zip_code.into(),
            country: country.into(),
        }
    }
}
