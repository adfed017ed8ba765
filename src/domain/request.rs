use super::commission;
use super::ids::{OrderId, PartyId, RequestId};
use super::money::{Amount, saturating_sub};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Upfront,
    HalfPayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    FullyPaid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::FullyPaid => "fully_paid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    /// No funds have arrived yet.
    Pending,
    /// Funds exist un-claimed. The only state payouts and disputes act on.
    Held,
    Released,
    Refunded,
    Frozen,
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
            EscrowStatus::Frozen => "frozen",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    DesignSubmitted,
    Approved,
    /// Approval timeout elapsed without a customer decision; releasable like
    /// an explicit approval. The timer itself lives outside this crate.
    AutoApproved,
    InProduction,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Whether the designer-payout leg may be released in this state.
    pub fn is_releasable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Approved
                | RequestStatus::AutoApproved
                | RequestStatus::InProduction
                | RequestStatus::Completed
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::DesignSubmitted => "design_submitted",
            RequestStatus::Approved => "approved",
            RequestStatus::AutoApproved => "auto_approved",
            RequestStatus::InProduction => "in_production",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One of the two payout destinations for a request's held funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Designer,
    Shop,
}

/// Written exactly once per leg; its presence is the authoritative
/// "already paid" signal, re-checked before every payout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaidRecord {
    pub at: DateTime<Utc>,
    /// Share of the held funds this leg claimed.
    pub gross: Decimal,
    /// What the party actually received, net of commission.
    pub net: Decimal,
}

/// Tagged payout state instead of an optional timestamp, so "paid without a
/// record" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PayoutLeg {
    #[default]
    NotPaid,
    Paid(PaidRecord),
}

impl PayoutLeg {
    pub fn paid_record(&self) -> Option<&PaidRecord> {
        match self {
            PayoutLeg::NotPaid => None,
            PayoutLeg::Paid(record) => Some(record),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PayoutLeg::Paid(_))
    }
}

/// Terminal shape of a request's funds. A partial refund followed by a payout
/// is a split, never collapsed into the single `Refunded` status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settlement {
    Open,
    PaidOut,
    FullyRefunded,
    Split { paid_out: Decimal, refunded: Decimal },
}

/// The payment sub-document of a customization request. Only the escrow
/// ledger writes these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub total_amount: Amount,
    /// Designer-leg basis; the shop leg covers the remainder.
    pub design_fee: Amount,
    /// Monotonically non-decreasing once set.
    pub paid_amount: Decimal,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub escrow_status: EscrowStatus,
    /// Quoted once when funds are held, immutable thereafter.
    pub designer_payout_amount: Option<Decimal>,
    pub designer_leg: PayoutLeg,
    pub shop_leg: PayoutLeg,
    pub refunded_amount: Decimal,
}

impl PaymentDetails {
    pub fn new(total_amount: Amount, design_fee: Amount, payment_type: PaymentType) -> Result<Self> {
        if design_fee > total_amount {
            return Err(EscrowError::Validation(format!(
                "design fee {design_fee} exceeds total {total_amount}"
            )));
        }
        Ok(Self {
            total_amount,
            design_fee,
            paid_amount: Decimal::ZERO,
            payment_type,
            payment_status: PaymentStatus::Pending,
            escrow_status: EscrowStatus::Pending,
            designer_payout_amount: None,
            designer_leg: PayoutLeg::NotPaid,
            shop_leg: PayoutLeg::NotPaid,
            refunded_amount: Decimal::ZERO,
        })
    }

    pub fn shop_basis(&self) -> Decimal {
        self.total_amount.value() - self.design_fee.value()
    }

    /// Gross already claimed by paid legs.
    pub fn claimed_gross(&self) -> Decimal {
        let designer = self
            .designer_leg
            .paid_record()
            .map(|r| r.gross)
            .unwrap_or(Decimal::ZERO);
        let shop = self
            .shop_leg
            .paid_record()
            .map(|r| r.gross)
            .unwrap_or(Decimal::ZERO);
        designer + shop
    }

    /// Funds still sitting in escrow: total minus claims minus refunds.
    /// This is the refund bound.
    pub fn remaining_pool(&self) -> Decimal {
        saturating_sub(
            self.total_amount.value(),
            self.claimed_gross() + self.refunded_amount,
        )
    }

    /// Gross the designer leg would claim today. Refunds are allocated
    /// against the design fee first.
    pub fn designer_gross_due(&self) -> Decimal {
        saturating_sub(self.design_fee.value(), self.refunded_amount).min(self.remaining_pool())
    }

    /// Gross the shop leg would claim today: whatever remains after the
    /// designer leg settled.
    pub fn shop_gross_due(&self) -> Decimal {
        self.shop_basis().min(self.remaining_pool())
    }

    pub fn leg(&self, kind: LegKind) -> &PayoutLeg {
        match kind {
            LegKind::Designer => &self.designer_leg,
            LegKind::Shop => &self.shop_leg,
        }
    }

    pub fn record_paid(&mut self, kind: LegKind, record: PaidRecord) {
        match kind {
            LegKind::Designer => self.designer_leg = PayoutLeg::Paid(record),
            LegKind::Shop => self.shop_leg = PayoutLeg::Paid(record),
        }
    }

    /// Records a customer payment. `paid_amount` never decreases.
    pub fn record_payment(&mut self, amount: Decimal) {
        self.paid_amount = self.paid_amount.max(amount);
        self.payment_status = if self.paid_amount >= self.total_amount.value() {
            PaymentStatus::FullyPaid
        } else if self.paid_amount > Decimal::ZERO {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Pending
        };
    }

    /// Enough of the price has arrived for production to begin.
    pub fn is_sufficient_for_production(&self) -> bool {
        match self.payment_type {
            PaymentType::Upfront => self.payment_status == PaymentStatus::FullyPaid,
            PaymentType::HalfPayment => matches!(
                self.payment_status,
                PaymentStatus::PartiallyPaid | PaymentStatus::FullyPaid
            ),
        }
    }

    /// Terminal status once the pool is exhausted: `Refunded` when nothing
    /// was ever paid out, `Released` otherwise.
    pub fn terminal_status(&self) -> Option<EscrowStatus> {
        if !self.remaining_pool().is_zero() {
            return None;
        }
        if self.claimed_gross().is_zero() && !self.refunded_amount.is_zero() {
            Some(EscrowStatus::Refunded)
        } else {
            Some(EscrowStatus::Released)
        }
    }

    pub fn settlement(&self) -> Settlement {
        match self.escrow_status {
            EscrowStatus::Refunded => Settlement::FullyRefunded,
            EscrowStatus::Released => {
                if self.refunded_amount.is_zero() {
                    Settlement::PaidOut
                } else {
                    Settlement::Split {
                        paid_out: self.claimed_gross(),
                        refunded: self.refunded_amount,
                    }
                }
            }
            _ => Settlement::Open,
        }
    }
}

/// The unit of work. The escrow ledger owns `payment`, the production tracker
/// owns `production`; each writes only its own sub-document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomizationRequest {
    pub id: RequestId,
    pub customer_id: PartyId,
    pub designer_id: PartyId,
    pub printing_shop_id: Option<PartyId>,
    pub status: RequestStatus,
    pub payment: PaymentDetails,
    pub production: Option<super::production::ProductionDetails>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl CustomizationRequest {
    pub fn new(
        id: RequestId,
        customer_id: PartyId,
        designer_id: PartyId,
        payment: PaymentDetails,
    ) -> Self {
        Self {
            id,
            customer_id,
            designer_id,
            printing_shop_id: None,
            status: RequestStatus::Submitted,
            payment,
            production: None,
            order_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_party(&self, party: &PartyId) -> bool {
        &self.customer_id == party
            || &self.designer_id == party
            || self.printing_shop_id.as_ref() == Some(party)
    }

    /// The commission quote used for the designer payout, derived from the
    /// design fee alone.
    pub fn designer_payout_quote(&self) -> Decimal {
        commission::net_of_commission(self.design_fee())
    }

    fn design_fee(&self) -> Decimal {
        self.payment.design_fee.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment(total: Decimal, fee: Decimal) -> PaymentDetails {
        PaymentDetails::new(
            Amount::new(total).unwrap(),
            Amount::new(fee).unwrap(),
            PaymentType::Upfront,
        )
        .unwrap()
    }

    #[test]
    fn test_design_fee_bounded_by_total() {
        assert!(
            PaymentDetails::new(
                Amount::new(dec!(100)).unwrap(),
                Amount::new(dec!(200)).unwrap(),
                PaymentType::Upfront,
            )
            .is_err()
        );
    }

    #[test]
    fn test_remaining_pool_tracks_claims_and_refunds() {
        let mut p = payment(dec!(1000), dec!(600));
        assert_eq!(p.remaining_pool(), dec!(1000));

        p.record_paid(
            LegKind::Designer,
            PaidRecord {
                at: Utc::now(),
                gross: dec!(600),
                net: dec!(552),
            },
        );
        assert_eq!(p.remaining_pool(), dec!(400));

        p.refunded_amount = dec!(150);
        assert_eq!(p.remaining_pool(), dec!(250));
    }

    #[test]
    fn test_refund_reduces_designer_basis_first() {
        let mut p = payment(dec!(1000), dec!(600));
        p.refunded_amount = dec!(250);
        assert_eq!(p.designer_gross_due(), dec!(350));

        // Overflow past the design fee eats into the shop basis.
        p.refunded_amount = dec!(700);
        assert_eq!(p.designer_gross_due(), dec!(0));
        assert_eq!(p.remaining_pool(), dec!(300));
    }

    #[test]
    fn test_record_payment_is_monotonic() {
        let mut p = payment(dec!(1000), dec!(600));
        p.record_payment(dec!(500));
        assert_eq!(p.payment_status, PaymentStatus::PartiallyPaid);
        p.record_payment(dec!(300));
        assert_eq!(p.paid_amount, dec!(500));
        p.record_payment(dec!(1000));
        assert_eq!(p.payment_status, PaymentStatus::FullyPaid);
    }

    #[test]
    fn test_terminal_status_distinguishes_refund_from_release() {
        let mut p = payment(dec!(500), dec!(500));
        assert_eq!(p.terminal_status(), None);

        p.refunded_amount = dec!(500);
        assert_eq!(p.terminal_status(), Some(EscrowStatus::Refunded));

        let mut p = payment(dec!(500), dec!(500));
        p.record_paid(
            LegKind::Designer,
            PaidRecord {
                at: Utc::now(),
                gross: dec!(250),
                net: dec!(230),
            },
        );
        p.refunded_amount = dec!(250);
        // A split ends released, not refunded.
        assert_eq!(p.terminal_status(), Some(EscrowStatus::Released));
    }

    #[test]
    fn test_settlement_reports_split() {
        let mut p = payment(dec!(1000), dec!(1000));
        p.refunded_amount = dec!(500);
        p.record_paid(
            LegKind::Designer,
            PaidRecord {
                at: Utc::now(),
                gross: dec!(500),
                net: dec!(460),
            },
        );
        p.escrow_status = EscrowStatus::Released;
        assert_eq!(
            p.settlement(),
            Settlement::Split {
                paid_out: dec!(500),
                refunded: dec!(500),
            }
        );
    }

    #[test]
    fn test_half_payment_sufficiency() {
        let mut p = PaymentDetails::new(
            Amount::new(dec!(1000)).unwrap(),
            Amount::new(dec!(400)).unwrap(),
            PaymentType::HalfPayment,
        )
        .unwrap();
        assert!(!p.is_sufficient_for_production());
        p.record_payment(dec!(500));
        assert!(p.is_sufficient_for_production());
    }
}
