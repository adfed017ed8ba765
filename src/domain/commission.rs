use super::money::Amount;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform cut applied to every subtotal component.
pub const COMMISSION_RATE: Decimal = dec!(0.08);

#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionInput {
    pub product_subtotal: Amount,
    pub design_subtotal: Amount,
    pub customization_design_fee: Amount,
}

/// Derived from which subtotal components are non-zero, never chosen by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    Product,
    Design,
    Mixed,
    Customization,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commission {
    pub rate: Decimal,
    pub amount: Decimal,
    pub kind: CommissionKind,
}

/// Computes the platform commission for a transaction. Pure; safe to call any
/// number of times.
pub fn calculate(input: &CommissionInput) -> Commission {
    let total = input.product_subtotal.value()
        + input.design_subtotal.value()
        + input.customization_design_fee.value();

    if total.is_zero() {
        return Commission {
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
            kind: CommissionKind::Product,
        };
    }

    let kind = if !input.customization_design_fee.is_zero() {
        CommissionKind::Customization
    } else {
        match (
            input.product_subtotal.is_zero(),
            input.design_subtotal.is_zero(),
        ) {
            (false, true) => CommissionKind::Product,
            (true, false) => CommissionKind::Design,
            _ => CommissionKind::Mixed,
        }
    };

    Commission {
        rate: COMMISSION_RATE,
        amount: total * COMMISSION_RATE,
        kind,
    }
}

/// What a party receives from a gross amount once the platform takes its cut.
pub fn net_of_commission(gross: Decimal) -> Decimal {
    gross - gross * COMMISSION_RATE
}
