use super::event_reader::EventRecord;
use crate::application::disputes::{DisputeEngine, RefundOffer, ResolveDispute};
use crate::application::escrow::EscrowLedger;
use crate::application::production::ProductionTracker;
use crate::application::reconciler::{PaymentReconciler, WebhookPayload};
use crate::domain::dispute::{Dispute, DisputeCategory, DisputeTarget, FileDispute, ResolutionOutcome};
use crate::domain::ids::{InvoiceRef, OrderId, PartyId, RequestId};
use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderKind};
use crate::domain::ports::{DisputeStoreRef, InvoiceStatus, OrderStoreRef, RequestStoreRef};
use crate::domain::request::{CustomizationRequest, PaymentDetails, PaymentType, RequestStatus};
use crate::error::{EscrowError, Result};
use crate::infrastructure::in_memory::InMemoryGateway;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Wires one event-log row to the service it drives. The replay runs against
/// the scriptable in-memory gateway, so an event log can exercise webhook
/// and manual-verification paths offline.
pub struct ReplayContext {
    pub requests: RequestStoreRef,
    pub orders: OrderStoreRef,
    pub disputes: DisputeStoreRef,
    pub gateway: Arc<InMemoryGateway>,
    pub escrow: Arc<EscrowLedger>,
    pub dispute_engine: DisputeEngine,
    pub production: ProductionTracker,
    pub reconciler: PaymentReconciler,
}

impl ReplayContext {
    pub async fn apply(&self, record: &EventRecord) -> Result<()> {
        match record.event.as_str() {
            "request" => self.create_request(record).await,
            "order" => self.create_order(record).await,
            "invoice" => self.seed_invoice(record).await,
            "payment" => self.webhook(record).await,
            "verify" => {
                self.reconciler.verify_payment(&order_id(record)?).await?;
                Ok(())
            }
            "design_submitted" => {
                self.requests
                    .update_status(&request_id(record)?, RequestStatus::DesignSubmitted)
                    .await
            }
            "approve" => {
                self.requests
                    .update_status(&request_id(record)?, RequestStatus::Approved)
                    .await
            }
            "auto_approve" => {
                self.requests
                    .update_status(&request_id(record)?, RequestStatus::AutoApproved)
                    .await
            }
            "hold" => {
                let amount = Amount::new(amount(record)?)?;
                let payment_type = match record.detail.as_deref() {
                    Some("half_payment") => PaymentType::HalfPayment,
                    _ => PaymentType::Upfront,
                };
                self.escrow
                    .hold_funds(&request_id(record)?, amount, payment_type)
                    .await?;
                Ok(())
            }
            "release_designer" => {
                self.escrow
                    .release_designer_payment(&request_id(record)?)
                    .await?;
                Ok(())
            }
            "release_shop" => {
                self.escrow.release_shop_payment(&request_id(record)?).await?;
                Ok(())
            }
            "refund" => {
                self.escrow
                    .refund_escrow(&request_id(record)?, amount(record)?)
                    .await?;
                Ok(())
            }
            "confirm_production" => {
                self.production
                    .confirm_production(&request_id(record)?, &actor(record)?)
                    .await?;
                Ok(())
            }
            "start_production" => {
                self.production
                    .start_production(&request_id(record)?, &actor(record)?)
                    .await?;
                Ok(())
            }
            "quality_check" => {
                let passed = matches!(record.detail.as_deref(), Some("pass"));
                self.production
                    .record_quality_check(&request_id(record)?, &actor(record)?, passed)
                    .await?;
                Ok(())
            }
            "complete_production" => {
                self.production
                    .complete_production(&request_id(record)?, &actor(record)?)
                    .await?;
                Ok(())
            }
            "ship" => {
                self.production.mark_shipped(&order_id(record)?).await?;
                Ok(())
            }
            "deliver" => {
                self.production.mark_delivered(&order_id(record)?).await?;
                Ok(())
            }
            "file_dispute" => self.file_dispute(record).await,
            "accept_dispute" => {
                let dispute = self.open_dispute(record).await?;
                self.dispute_engine
                    .accept_dispute(&dispute.id, &actor(record)?)
                    .await?;
                Ok(())
            }
            "offer_partial" => {
                let dispute = self.open_dispute(record).await?;
                let offer = if record.detail.as_deref() == Some("percent") {
                    RefundOffer::Percentage(amount(record)?)
                } else {
                    RefundOffer::Amount(amount(record)?)
                };
                self.dispute_engine
                    .offer_partial_refund(&dispute.id, &actor(record)?, offer)
                    .await?;
                Ok(())
            }
            "accept_partial" => {
                let dispute = self.open_dispute(record).await?;
                self.dispute_engine
                    .accept_partial_refund(&dispute.id, &actor(record)?)
                    .await?;
                Ok(())
            }
            "reject_partial" => {
                let dispute = self.open_dispute(record).await?;
                self.dispute_engine
                    .reject_partial_refund(&dispute.id, &actor(record)?)
                    .await?;
                Ok(())
            }
            "resolve_dispute" => self.resolve_dispute(record).await,
            "cancel_dispute" => {
                let dispute = self.open_dispute(record).await?;
                self.dispute_engine
                    .cancel_dispute(&dispute.id, &actor(record)?)
                    .await?;
                Ok(())
            }
            other => Err(EscrowError::Validation(format!("unknown event: {other}"))),
        }
    }

    async fn create_request(&self, record: &EventRecord) -> Result<()> {
        let total = Amount::new(amount(record)?)?;
        let (fee, payment_type) = match record.detail.as_deref() {
            Some(detail) => {
                let (fee, kind) = detail.split_once(':').unwrap_or((detail, "upfront"));
                let fee = fee.parse::<Decimal>().map_err(|_| {
                    EscrowError::Validation(format!("invalid design fee: {fee}"))
                })?;
                let payment_type = match kind {
                    "half_payment" => PaymentType::HalfPayment,
                    _ => PaymentType::Upfront,
                };
                (Amount::new(fee)?, payment_type)
            }
            None => (total, PaymentType::Upfront),
        };
        let payment = PaymentDetails::new(total, fee, payment_type)?;
        let request = CustomizationRequest::new(
            request_id(record)?,
            actor(record)?,
            counterparty(record)?,
            payment,
        );
        self.requests.insert(request).await
    }

    async fn create_order(&self, record: &EventRecord) -> Result<()> {
        let kind = match record.detail.as_deref() {
            Some("design") => OrderKind::DesignOnly,
            _ => OrderKind::CustomProduct,
        };
        let mut order = Order::new(
            order_id(record)?,
            actor(record)?,
            kind,
            Amount::new(amount(record)?)?,
        );
        order.designer_id = record.counterparty.as_deref().map(PartyId::from);
        order.invoice = record.invoice.as_deref().map(InvoiceRef::from);
        if let Some(request) = record.request.as_deref() {
            let request_id = RequestId::from(request);
            order.request_id = Some(request_id.clone());
            self.requests.link_order(&request_id, &order.id).await?;
        }
        self.orders.insert(order).await
    }

    async fn seed_invoice(&self, record: &EventRecord) -> Result<()> {
        let reference = record
            .invoice
            .as_deref()
            .map(InvoiceRef::from)
            .ok_or_else(|| EscrowError::Validation("invoice event needs a reference".into()))?;
        let status = invoice_status(record.detail.as_deref())?;
        self.gateway
            .seed_invoice(reference, status, amount(record)?)
            .await;
        Ok(())
    }

    async fn webhook(&self, record: &EventRecord) -> Result<()> {
        let payload = WebhookPayload {
            invoice_id: record.invoice.clone().unwrap_or_default(),
            external_id: order_id(record)?.0,
            status: invoice_status(record.detail.as_deref())?,
            amount: amount(record)?,
        };
        self.reconciler.handle_webhook(payload).await?;
        Ok(())
    }

    async fn file_dispute(&self, record: &EventRecord) -> Result<()> {
        let input = FileDispute {
            filed_by: actor(record)?,
            accused_party: counterparty(record)?,
            order_id: record.order.as_deref().map(OrderId::from),
            customization_request_id: record.request.as_deref().map(RequestId::from),
            category: category(record.detail.as_deref()),
            description: record.detail.clone().unwrap_or_default(),
        };
        self.dispute_engine.file_dispute(input).await?;
        Ok(())
    }

    async fn resolve_dispute(&self, record: &EventRecord) -> Result<()> {
        let dispute = self.open_dispute(record).await?;
        let detail = record.detail.as_deref().unwrap_or("rejected");
        let (verdict, strike) = match detail.split_once(':') {
            Some((verdict, "strike")) => (verdict, true),
            _ => (detail, false),
        };
        let outcome = match verdict {
            "full_refund" => ResolutionOutcome::FullRefund,
            "partial_refund" => ResolutionOutcome::PartialRefund,
            "rejected" => ResolutionOutcome::Rejected,
            other => {
                return Err(EscrowError::Validation(format!(
                    "unknown resolution outcome: {other}"
                )));
            }
        };
        let resolution = ResolveDispute {
            outcome,
            reason: format!("resolved via event log: {verdict}"),
            partial_refund_amount: record.amount,
            issue_strike: strike,
            admin_notes: None,
        };
        self.dispute_engine
            .resolve_dispute(&dispute.id, resolution, &actor(record)?)
            .await?;
        Ok(())
    }

    /// Dispute events address disputes by their target, the way dashboard
    /// actions do.
    async fn open_dispute(&self, record: &EventRecord) -> Result<Dispute> {
        let target = if let Some(request) = record.request.as_deref() {
            DisputeTarget::Request {
                request_id: RequestId::from(request),
            }
        } else if let Some(order) = record.order.as_deref() {
            DisputeTarget::Order {
                order_id: OrderId::from(order),
            }
        } else {
            return Err(EscrowError::Validation(
                "dispute event needs a request or order reference".into(),
            ));
        };
        self.disputes
            .open_for_target(&target)
            .await?
            .ok_or_else(|| EscrowError::not_found("dispute", format!("{target:?}")))
    }
}

fn request_id(record: &EventRecord) -> Result<RequestId> {
    record
        .request
        .as_deref()
        .map(RequestId::from)
        .ok_or_else(|| EscrowError::Validation(format!("{} needs a request id", record.event)))
}

fn order_id(record: &EventRecord) -> Result<OrderId> {
    record
        .order
        .as_deref()
        .map(OrderId::from)
        .ok_or_else(|| EscrowError::Validation(format!("{} needs an order id", record.event)))
}

fn actor(record: &EventRecord) -> Result<PartyId> {
    record
        .actor
        .as_deref()
        .map(PartyId::from)
        .ok_or_else(|| EscrowError::Validation(format!("{} needs an actor", record.event)))
}

fn counterparty(record: &EventRecord) -> Result<PartyId> {
    record
        .counterparty
        .as_deref()
        .map(PartyId::from)
        .ok_or_else(|| EscrowError::Validation(format!("{} needs a counterparty", record.event)))
}

fn amount(record: &EventRecord) -> Result<Decimal> {
    record
        .amount
        .ok_or_else(|| EscrowError::Validation(format!("{} needs an amount", record.event)))
}

fn invoice_status(detail: Option<&str>) -> Result<InvoiceStatus> {
    match detail {
        Some("paid") => Ok(InvoiceStatus::Paid),
        Some("failed") => Ok(InvoiceStatus::Failed),
        Some("refunded") => Ok(InvoiceStatus::Refunded),
        Some("pending") | None => Ok(InvoiceStatus::Pending),
        Some(other) => Err(EscrowError::Validation(format!(
            "unknown invoice status: {other}"
        ))),
    }
}

fn category(detail: Option<&str>) -> DisputeCategory {
    match detail {
        Some("quality_issue") => DisputeCategory::QualityIssue,
        Some("non_delivery") => DisputeCategory::NonDelivery,
        Some("misconduct") => DisputeCategory::Misconduct,
        _ => DisputeCategory::Other,
    }
}
