#![allow(dead_code)]

use atelier_escrow::application::disputes::DisputeEngine;
use atelier_escrow::application::escrow::EscrowLedger;
use atelier_escrow::application::production::ProductionTracker;
use atelier_escrow::application::reconciler::PaymentReconciler;
use atelier_escrow::domain::ids::{InvoiceRef, OrderId, PartyId, RequestId};
use atelier_escrow::domain::money::Amount;
use atelier_escrow::domain::order::{Order, OrderKind};
use atelier_escrow::domain::ports::{OrderStore, RequestStore};
use atelier_escrow::domain::request::{CustomizationRequest, PaymentDetails, PaymentType};
use atelier_escrow::infrastructure::in_memory::{
    InMemoryDisputeStore, InMemoryEarningsStore, InMemoryEventBus, InMemoryGateway,
    InMemoryOrderStore, InMemoryRequestStore, InMemoryStrikeStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// In-memory wiring of the whole engine, the same shape `main` builds.
pub struct Harness {
    pub requests: Arc<InMemoryRequestStore>,
    pub orders: Arc<InMemoryOrderStore>,
    pub disputes: Arc<InMemoryDisputeStore>,
    pub strikes: Arc<InMemoryStrikeStore>,
    pub earnings: Arc<InMemoryEarningsStore>,
    pub gateway: Arc<InMemoryGateway>,
    pub events: Arc<InMemoryEventBus>,
    pub escrow: Arc<EscrowLedger>,
    pub dispute_engine: DisputeEngine,
    pub production: ProductionTracker,
    pub reconciler: PaymentReconciler,
}

pub fn harness() -> Harness {
    let requests = Arc::new(InMemoryRequestStore::new());
    let orders = Arc::new(InMemoryOrderStore::new());
    let disputes = Arc::new(InMemoryDisputeStore::new());
    let strikes = Arc::new(InMemoryStrikeStore::new());
    let earnings = Arc::new(InMemoryEarningsStore::new());
    let gateway = Arc::new(InMemoryGateway::new());
    let events = Arc::new(InMemoryEventBus::new());

    let escrow = Arc::new(EscrowLedger::new(
        requests.clone(),
        orders.clone(),
        gateway.clone(),
        events.clone(),
    ));
    let dispute_engine = DisputeEngine::new(
        disputes.clone(),
        requests.clone(),
        orders.clone(),
        strikes.clone(),
        escrow.clone(),
        events.clone(),
    );
    let production = ProductionTracker::new(
        requests.clone(),
        orders.clone(),
        escrow.clone(),
        events.clone(),
    );
    let reconciler = PaymentReconciler::new(
        orders.clone(),
        requests.clone(),
        earnings.clone(),
        gateway.clone(),
        escrow.clone(),
        events.clone(),
    );

    Harness {
        requests,
        orders,
        disputes,
        strikes,
        earnings,
        gateway,
        events,
        escrow,
        dispute_engine,
        production,
        reconciler,
    }
}

pub fn customer() -> PartyId {
    PartyId::from("cust-1")
}

pub fn designer() -> PartyId {
    PartyId::from("des-1")
}

pub fn shop() -> PartyId {
    PartyId::from("shop-1")
}

pub fn admin() -> PartyId {
    PartyId::from("admin-1")
}

pub async fn seed_request(
    harness: &Harness,
    id: &str,
    total: Decimal,
    design_fee: Decimal,
) -> RequestId {
    let payment = PaymentDetails::new(
        Amount::new(total).unwrap(),
        Amount::new(design_fee).unwrap(),
        PaymentType::Upfront,
    )
    .unwrap();
    let request =
        CustomizationRequest::new(RequestId::from(id), customer(), designer(), payment);
    let request_id = request.id.clone();
    harness.requests.insert(request).await.unwrap();
    request_id
}

/// Seeds a custom-product order linked to a request, with an invoice on
/// file so refunds have somewhere to go.
pub async fn seed_custom_order(
    harness: &Harness,
    order_id: &str,
    request_id: &RequestId,
    total: Decimal,
    invoice: &str,
) -> OrderId {
    let mut order = Order::new(
        OrderId::from(order_id),
        customer(),
        OrderKind::CustomProduct,
        Amount::new(total).unwrap(),
    );
    order.designer_id = Some(designer());
    order.invoice = Some(InvoiceRef::from(invoice));
    order.request_id = Some(request_id.clone());
    let id = order.id.clone();
    harness.orders.insert(order).await.unwrap();
    harness.requests.link_order(request_id, &id).await.unwrap();
    id
}

pub async fn seed_design_order(
    harness: &Harness,
    order_id: &str,
    total: Decimal,
    invoice: &str,
) -> OrderId {
    let mut order = Order::new(
        OrderId::from(order_id),
        customer(),
        OrderKind::DesignOnly,
        Amount::new(total).unwrap(),
    );
    order.designer_id = Some(designer());
    order.invoice = Some(InvoiceRef::from(invoice));
    let id = order.id.clone();
    harness.orders.insert(order).await.unwrap();
    id
}
