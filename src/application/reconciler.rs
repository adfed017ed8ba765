use super::escrow::EscrowLedger;
use crate::domain::events::DomainEvent;
use crate::domain::ids::OrderId;
use crate::domain::money::Amount;
use crate::domain::order::{DesignerEarning, Order, OrderKind, OrderStatus};
use crate::domain::ports::{
    EarningsStoreRef, EventBusRef, InvoiceStatus, OrderStoreRef, PaymentGatewayRef,
    RequestStoreRef,
};
use crate::domain::request::PaymentStatus;
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gateway webhook body. Delivered at-least-once, unordered relative to
/// manual verification calls.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub invoice_id: String,
    pub external_id: String,
    pub status: InvoiceStatus,
    pub amount: Decimal,
}

/// What a manual verification reports back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub invoice_status: InvoiceStatus,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub was_updated: bool,
}

/// Aligns local payment state with the gateway's authoritative status.
/// Webhooks and the manual pull converge on the same idempotent transition,
/// so missed or replayed deliveries cannot double-apply.
pub struct PaymentReconciler {
    orders: OrderStoreRef,
    requests: RequestStoreRef,
    earnings: EarningsStoreRef,
    gateway: PaymentGatewayRef,
    escrow: Arc<EscrowLedger>,
    events: EventBusRef,
}

impl PaymentReconciler {
    pub fn new(
        orders: OrderStoreRef,
        requests: RequestStoreRef,
        earnings: EarningsStoreRef,
        gateway: PaymentGatewayRef,
        escrow: Arc<EscrowLedger>,
        events: EventBusRef,
    ) -> Self {
        Self {
            orders,
            requests,
            earnings,
            gateway,
            escrow,
            events,
        }
    }

    pub async fn handle_webhook(&self, payload: WebhookPayload) -> Result<VerificationReport> {
        let order = self
            .orders
            .get_by_external(&payload.external_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("order", payload.external_id.clone()))?;
        debug!(order = %order.id, invoice = %payload.invoice_id, status = %payload.status, "webhook received");
        self.apply_invoice_status(order, payload.status, payload.amount)
            .await
    }

    /// Pulls the invoice directly from the gateway when a webhook may have
    /// been missed.
    pub async fn verify_payment(&self, order_id: &OrderId) -> Result<VerificationReport> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("order", order_id.as_str()))?;
        let invoice_ref = order.invoice.clone().ok_or_else(|| {
            EscrowError::Validation(format!("order {order_id} has no invoice to verify"))
        })?;
        let invoice = self.gateway.get_invoice(&invoice_ref).await?;
        self.apply_invoice_status(order, invoice.status, invoice.amount)
            .await
    }

    /// The single convergent transition both inputs funnel into. Anything
    /// already applied reports `was_updated: false` and is otherwise a no-op.
    async fn apply_invoice_status(
        &self,
        order: Order,
        invoice_status: InvoiceStatus,
        amount: Decimal,
    ) -> Result<VerificationReport> {
        let mut was_updated = false;

        match invoice_status {
            InvoiceStatus::Paid if order.payment_status == PaymentStatus::Pending => {
                self.orders.record_payment(&order.id, amount).await?;
                was_updated = true;

                match order.kind {
                    OrderKind::DesignOnly => {
                        // No production leg: deliver immediately and credit
                        // the designer, once.
                        self.orders
                            .update_status(&order.id, OrderStatus::Delivered)
                            .await?;
                        self.record_earning_once(&order).await?;
                    }
                    OrderKind::CustomProduct => {
                        self.orders
                            .update_status(&order.id, OrderStatus::Processing)
                            .await?;
                        self.drive_escrow_hold(&order, amount).await?;
                    }
                }
                info!(order = %order.id, %amount, "payment confirmed");
            }
            InvoiceStatus::Failed if order.status == OrderStatus::PendingPayment => {
                self.orders
                    .update_status(&order.id, OrderStatus::Cancelled)
                    .await?;
                was_updated = true;
                info!(order = %order.id, "payment failed, order cancelled");
            }
            _ => {
                debug!(order = %order.id, status = %invoice_status, "nothing to reconcile");
            }
        }

        let order = self
            .orders
            .get(&order.id)
            .await?
            .ok_or_else(|| EscrowError::not_found("order", order.id.as_str()))?;

        self.emit(DomainEvent::PaymentVerified {
            order_id: order.id.clone(),
            was_updated,
        })
        .await;

        Ok(VerificationReport {
            invoice_status,
            order_status: order.status,
            payment_status: order.payment_status,
            was_updated,
        })
    }

    /// Records designer earnings for a design-only sale, guarded by an
    /// existence check so webhook replays don't double-record.
    async fn record_earning_once(&self, order: &Order) -> Result<()> {
        if self.earnings.for_order(&order.id).await?.is_some() {
            debug!(order = %order.id, "earnings already recorded");
            return Ok(());
        }
        let Some(designer_id) = order.designer_id.clone() else {
            warn!(order = %order.id, "design-only order without a designer; skipping earnings");
            return Ok(());
        };
        let earning = DesignerEarning::new(
            order.id.clone(),
            designer_id.clone(),
            order.total_amount.value(),
        );
        let net = earning.net;
        self.earnings.record(earning).await?;
        self.emit(DomainEvent::EarningsRecorded {
            order_id: order.id.clone(),
            designer_id,
            net,
        })
        .await;
        Ok(())
    }

    /// Drives the escrow hold for a paid custom order. A concurrent webhook
    /// may have already held the funds; that race resolves as a no-op.
    async fn drive_escrow_hold(&self, order: &Order, amount: Decimal) -> Result<()> {
        let Some(request_id) = &order.request_id else {
            warn!(order = %order.id, "custom order without a linked request");
            return Ok(());
        };
        let Some(request) = self.requests.get(request_id).await? else {
            return Err(EscrowError::not_found(
                "customization request",
                request_id.as_str(),
            ));
        };
        let payment_type = request.payment.payment_type;
        match self
            .escrow
            .hold_funds(request_id, Amount::new(amount)?, payment_type)
            .await
        {
            Ok(_) => Ok(()),
            // Another delivery won the race; the hold already exists.
            Err(EscrowError::InvalidState { .. }) => {
                debug!(request = %request_id, "escrow already held");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(error) = self.events.emit(event).await {
            warn!(%error, "event emission failed");
        }
    }
}
