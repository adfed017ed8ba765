use super::dispute::{DisputeTarget, ResolutionOutcome};
use super::ids::{DisputeId, OrderId, PartyId, RequestId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain events emitted after a successful persistence write. Consumed by
/// notification/activity collaborators outside this crate; emission is
/// fire-and-forget and never rolls back state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    EscrowHeld {
        request_id: RequestId,
        amount: Decimal,
    },
    DesignerPaid {
        request_id: RequestId,
        gross: Decimal,
        net: Decimal,
    },
    ShopPaid {
        request_id: RequestId,
        gross: Decimal,
        net: Decimal,
    },
    EscrowFrozen {
        request_id: RequestId,
    },
    EscrowUnfrozen {
        request_id: RequestId,
    },
    EscrowRefunded {
        request_id: RequestId,
        amount: Decimal,
        remaining: Decimal,
    },
    DisputeFiled {
        dispute_id: DisputeId,
        target: DisputeTarget,
    },
    PartialRefundOffered {
        dispute_id: DisputeId,
        amount: Decimal,
    },
    PartialRefundRejected {
        dispute_id: DisputeId,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        outcome: ResolutionOutcome,
    },
    DisputeCancelled {
        dispute_id: DisputeId,
    },
    StrikeIssued {
        party_id: PartyId,
        dispute_id: DisputeId,
    },
    ProductionConfirmed {
        request_id: RequestId,
        shop_id: PartyId,
    },
    ProductionStarted {
        request_id: RequestId,
    },
    QualityCheckRecorded {
        request_id: RequestId,
        passed: bool,
    },
    ProductionCompleted {
        request_id: RequestId,
    },
    OrderShipped {
        order_id: OrderId,
    },
    OrderDelivered {
        order_id: OrderId,
    },
    PaymentVerified {
        order_id: OrderId,
        was_updated: bool,
    },
    EarningsRecorded {
        order_id: OrderId,
        designer_id: PartyId,
        net: Decimal,
    },
}

impl DomainEvent {
    /// Stable name used as the routing key on the bus.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EscrowHeld { .. } => "escrow_held",
            DomainEvent::DesignerPaid { .. } => "designer_paid",
            DomainEvent::ShopPaid { .. } => "shop_paid",
            DomainEvent::EscrowFrozen { .. } => "escrow_frozen",
            DomainEvent::EscrowUnfrozen { .. } => "escrow_unfrozen",
            DomainEvent::EscrowRefunded { .. } => "escrow_refunded",
            DomainEvent::DisputeFiled { .. } => "dispute_filed",
            DomainEvent::PartialRefundOffered { .. } => "partial_refund_offered",
            DomainEvent::PartialRefundRejected { .. } => "partial_refund_rejected",
            DomainEvent::DisputeResolved { .. } => "dispute_resolved",
            DomainEvent::DisputeCancelled { .. } => "dispute_cancelled",
            DomainEvent::StrikeIssued { .. } => "strike_issued",
            DomainEvent::ProductionConfirmed { .. } => "production_confirmed",
            DomainEvent::ProductionStarted { .. } => "production_started",
            DomainEvent::QualityCheckRecorded { .. } => "quality_check_recorded",
            DomainEvent::ProductionCompleted { .. } => "production_completed",
            DomainEvent::OrderShipped { .. } => "order_shipped",
            DomainEvent::OrderDelivered { .. } => "order_delivered",
            DomainEvent::PaymentVerified { .. } => "payment_verified",
            DomainEvent::EarningsRecorded { .. } => "earnings_recorded",
        }
    }
}
