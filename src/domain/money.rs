use crate::error::EscrowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative monetary amount with fixed-point precision.
///
/// Wrapper around `rust_decimal::Decimal` so negative values are rejected at
/// construction and cannot enter payment documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EscrowError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EscrowError::Validation(format!(
                "amount must not be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Clamps a subtraction at zero. Payment arithmetic never produces negative
/// residuals, it bottoms out.
pub fn saturating_sub(lhs: Decimal, rhs: Decimal) -> Decimal {
    if rhs >= lhs { Decimal::ZERO } else { lhs - rhs }
}
