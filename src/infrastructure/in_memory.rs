use crate::domain::dispute::{Dispute, DisputeTarget, Strike};
use crate::domain::events::DomainEvent;
use crate::domain::ids::{DisputeId, InvoiceRef, OrderId, PartyId, RequestId};
use crate::domain::order::{DesignerEarning, Order, OrderStatus};
use crate::domain::ports::{
    ClaimOutcome, DisputeStore, EarningsStore, EventBus, Invoice, InvoiceStatus, OrderStore,
    PaymentGateway, RequestStore, StrikeStore,
};
use crate::domain::production::ProductionDetails;
use crate::domain::request::{
    CustomizationRequest, EscrowStatus, LegKind, PaidRecord, PayoutLeg, PaymentDetails,
    RequestStatus,
};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory store for customization requests.
///
/// The write lock is what makes `claim_leg` and `cas_escrow_status` behave
/// like the per-document atomic updates of the real document store.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    requests: Arc<RwLock<HashMap<RequestId, CustomizationRequest>>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get(&self, id: &RequestId) -> Result<Option<CustomizationRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<CustomizationRequest>> {
        let requests = self.requests.read().await;
        let mut all: Vec<_> = requests.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(all)
    }

    async fn insert(&self, request: CustomizationRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn update_payment(&self, id: &RequestId, payment: PaymentDetails) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        request.payment = payment;
        Ok(())
    }

    async fn update_production(&self, id: &RequestId, production: ProductionDetails) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        request.production = Some(production);
        Ok(())
    }

    async fn update_status(&self, id: &RequestId, status: RequestStatus) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        request.status = status;
        Ok(())
    }

    async fn link_order(&self, id: &RequestId, order_id: &OrderId) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        request.order_id = Some(order_id.clone());
        Ok(())
    }

    async fn set_shop(&self, id: &RequestId, shop_id: &PartyId) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        request.printing_shop_id = Some(shop_id.clone());
        Ok(())
    }

    async fn claim_leg(
        &self,
        id: &RequestId,
        leg: LegKind,
        record: PaidRecord,
    ) -> Result<ClaimOutcome> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        match request.payment.leg(leg) {
            PayoutLeg::Paid(existing) => Ok(ClaimOutcome::AlreadyPaid(*existing)),
            PayoutLeg::NotPaid => {
                request.payment.record_paid(leg, record);
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn cas_escrow_status(
        &self,
        id: &RequestId,
        current: EscrowStatus,
        next: EscrowStatus,
    ) -> Result<bool> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))?;
        if request.payment.escrow_status == current {
            request.payment.escrow_status = next;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<_> = orders.values().cloned().collect();
        all.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(all)
    }

    async fn get_by_external(&self, external_id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        // The marketplace uses the order id as the gateway external id.
        Ok(orders.get(&OrderId::from(external_id)).cloned())
    }

    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("order", id.as_str()))?;
        order.status = status;
        match status {
            OrderStatus::Shipped => order.shipped_at = Some(chrono::Utc::now()),
            OrderStatus::Delivered => order.delivered_at = Some(chrono::Utc::now()),
            _ => {}
        }
        Ok(())
    }

    async fn record_payment(&self, id: &OrderId, paid_amount: Decimal) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| EscrowError::not_found("order", id.as_str()))?;
        order.paid_amount = order.paid_amount.max(paid_amount);
        order.payment_status = if order.paid_amount >= order.total_amount.value() {
            crate::domain::request::PaymentStatus::FullyPaid
        } else if order.paid_amount > Decimal::ZERO {
            crate::domain::request::PaymentStatus::PartiallyPaid
        } else {
            crate::domain::request::PaymentStatus::Pending
        };
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDisputeStore {
    disputes: Arc<RwLock<HashMap<DisputeId, Dispute>>>,
}

impl InMemoryDisputeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DisputeStore for InMemoryDisputeStore {
    async fn get(&self, id: &DisputeId) -> Result<Option<Dispute>> {
        let disputes = self.disputes.read().await;
        Ok(disputes.get(id).cloned())
    }

    async fn insert(&self, dispute: Dispute) -> Result<()> {
        let mut disputes = self.disputes.write().await;
        disputes.insert(dispute.id, dispute);
        Ok(())
    }

    async fn update(&self, dispute: Dispute) -> Result<()> {
        let mut disputes = self.disputes.write().await;
        disputes.insert(dispute.id, dispute);
        Ok(())
    }

    async fn open_for_target(&self, target: &DisputeTarget) -> Result<Option<Dispute>> {
        let disputes = self.disputes.read().await;
        Ok(disputes
            .values()
            .find(|dispute| dispute.is_open() && &dispute.target == target)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryStrikeStore {
    strikes: Arc<RwLock<Vec<Strike>>>,
}

impl InMemoryStrikeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrikeStore for InMemoryStrikeStore {
    async fn append(&self, strike: Strike) -> Result<()> {
        let mut strikes = self.strikes.write().await;
        strikes.push(strike);
        Ok(())
    }

    async fn for_party(&self, party_id: &PartyId) -> Result<Vec<Strike>> {
        let strikes = self.strikes.read().await;
        Ok(strikes
            .iter()
            .filter(|strike| &strike.party_id == party_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEarningsStore {
    earnings: Arc<RwLock<HashMap<OrderId, DesignerEarning>>>,
}

impl InMemoryEarningsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EarningsStore for InMemoryEarningsStore {
    async fn for_order(&self, order_id: &OrderId) -> Result<Option<DesignerEarning>> {
        let earnings = self.earnings.read().await;
        Ok(earnings.get(order_id).cloned())
    }

    async fn record(&self, earning: DesignerEarning) -> Result<()> {
        let mut earnings = self.earnings.write().await;
        earnings.insert(earning.order_id.clone(), earning);
        Ok(())
    }
}

/// Scriptable fake gateway. Invoices are seeded per reference; refunds are
/// recorded for assertion. `fail_next` makes the next call return
/// `GatewayUnavailable`, for exercising the no-retry contract.
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    invoices: Arc<RwLock<HashMap<InvoiceRef, Invoice>>>,
    refunds: Arc<RwLock<Vec<(InvoiceRef, Decimal)>>>,
    fail_next: Arc<RwLock<bool>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_invoice(&self, reference: InvoiceRef, status: InvoiceStatus, amount: Decimal) {
        let mut invoices = self.invoices.write().await;
        invoices.insert(
            reference.clone(),
            Invoice {
                id: reference.as_str().to_string(),
                status,
                amount,
            },
        );
    }

    pub async fn refunds(&self) -> Vec<(InvoiceRef, Decimal)> {
        self.refunds.read().await.clone()
    }

    pub async fn fail_next_call(&self) {
        *self.fail_next.write().await = true;
    }

    async fn take_failure(&self) -> bool {
        let mut fail = self.fail_next.write().await;
        std::mem::take(&mut *fail)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn get_invoice(&self, reference: &InvoiceRef) -> Result<Invoice> {
        if self.take_failure().await {
            return Err(EscrowError::GatewayUnavailable("simulated outage".to_string()));
        }
        let invoices = self.invoices.read().await;
        invoices
            .get(reference)
            .cloned()
            .ok_or_else(|| EscrowError::GatewayUnavailable(format!("unknown invoice {reference}")))
    }

    async fn refund_invoice(&self, reference: &InvoiceRef, amount: Decimal) -> Result<()> {
        if self.take_failure().await {
            return Err(EscrowError::GatewayUnavailable("simulated outage".to_string()));
        }
        let mut refunds = self.refunds.write().await;
        refunds.push((reference.clone(), amount));
        Ok(())
    }
}

/// Records every emitted event for assertions; stands in for the
/// notification/activity consumers outside this crate.
#[derive(Default, Clone)]
pub struct InMemoryEventBus {
    events: Arc<RwLock<Vec<DomainEvent>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn emitted(&self) -> Vec<DomainEvent> {
        self.events.read().await.clone()
    }

    pub async fn names(&self) -> Vec<&'static str> {
        self.events.read().await.iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn emit(&self, event: DomainEvent) -> Result<()> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }
}
