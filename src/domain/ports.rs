use super::dispute::{Dispute, DisputeTarget, Strike};
use super::events::DomainEvent;
use super::ids::{DisputeId, InvoiceRef, OrderId, PartyId, RequestId};
use super::order::{DesignerEarning, Order, OrderStatus};
use super::production::ProductionDetails;
use super::request::{
    CustomizationRequest, EscrowStatus, LegKind, PaidRecord, PaymentDetails, RequestStatus,
};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a conditional payout-leg write. The loser of a race observes the
/// winner's record and treats the outcome as success.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyPaid(PaidRecord),
}

/// Store for customization-request documents. `update_payment` and
/// `update_production` write disjoint sub-documents so the escrow ledger and
/// the production tracker never clobber each other; `claim_leg` and
/// `cas_escrow_status` are the per-document atomic primitives every payout
/// relies on.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, id: &RequestId) -> Result<Option<CustomizationRequest>>;
    async fn list(&self) -> Result<Vec<CustomizationRequest>>;
    async fn insert(&self, request: CustomizationRequest) -> Result<()>;
    async fn update_payment(&self, id: &RequestId, payment: PaymentDetails) -> Result<()>;
    async fn update_production(&self, id: &RequestId, production: ProductionDetails) -> Result<()>;
    async fn update_status(&self, id: &RequestId, status: RequestStatus) -> Result<()>;
    async fn link_order(&self, id: &RequestId, order_id: &OrderId) -> Result<()>;
    async fn set_shop(&self, id: &RequestId, shop_id: &PartyId) -> Result<()>;

    /// Writes the paid record only if the leg is currently unpaid, atomically
    /// with respect to other writers of the same document.
    async fn claim_leg(
        &self,
        id: &RequestId,
        leg: LegKind,
        record: PaidRecord,
    ) -> Result<ClaimOutcome>;

    /// Compare-and-set on the escrow status. Returns whether the swap
    /// happened.
    async fn cas_escrow_status(
        &self,
        id: &RequestId,
        current: EscrowStatus,
        next: EscrowStatus,
    ) -> Result<bool>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;
    async fn list(&self) -> Result<Vec<Order>>;
    /// Lookup by the external id the gateway echoes back in webhooks.
    async fn get_by_external(&self, external_id: &str) -> Result<Option<Order>>;
    async fn insert(&self, order: Order) -> Result<()>;
    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<()>;
    async fn record_payment(&self, id: &OrderId, paid_amount: Decimal) -> Result<()>;
}

#[async_trait]
pub trait DisputeStore: Send + Sync {
    async fn get(&self, id: &DisputeId) -> Result<Option<Dispute>>;
    async fn insert(&self, dispute: Dispute) -> Result<()>;
    async fn update(&self, dispute: Dispute) -> Result<()>;
    /// The open dispute (if any) against a target; one open dispute per
    /// target at a time.
    async fn open_for_target(&self, target: &DisputeTarget) -> Result<Option<Dispute>>;
}

/// Append-only penalty records.
#[async_trait]
pub trait StrikeStore: Send + Sync {
    async fn append(&self, strike: Strike) -> Result<()>;
    async fn for_party(&self, party_id: &PartyId) -> Result<Vec<Strike>>;
}

#[async_trait]
pub trait EarningsStore: Send + Sync {
    async fn for_order(&self, order_id: &OrderId) -> Result<Option<DesignerEarning>>;
    async fn record(&self, earning: DesignerEarning) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub status: InvoiceStatus,
    pub amount: Decimal,
}

/// The external payment gateway. Failures surface as `GatewayUnavailable`;
/// money-moving calls are never retried by this crate.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn get_invoice(&self, reference: &InvoiceRef) -> Result<Invoice>;
    async fn refund_invoice(&self, reference: &InvoiceRef, amount: Decimal) -> Result<()>;
}

/// Fire-and-forget event emission. A failed emit after a successful write is
/// logged by the caller, never rolled back.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: DomainEvent) -> Result<()>;
}

pub type RequestStoreRef = Arc<dyn RequestStore>;
pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type DisputeStoreRef = Arc<dyn DisputeStore>;
pub type StrikeStoreRef = Arc<dyn StrikeStore>;
pub type EarningsStoreRef = Arc<dyn EarningsStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type EventBusRef = Arc<dyn EventBus>;
