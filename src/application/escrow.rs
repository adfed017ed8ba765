use crate::domain::commission;
use crate::domain::events::DomainEvent;
use crate::domain::ids::{InvoiceRef, RequestId};
use crate::domain::money::Amount;
use crate::domain::ports::{
    ClaimOutcome, EventBusRef, OrderStoreRef, PaymentGatewayRef, RequestStoreRef,
};
use crate::domain::request::{
    CustomizationRequest, EscrowStatus, LegKind, PaidRecord, PaymentDetails, PaymentType,
};
use crate::error::{EscrowError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

/// Result of a payout attempt. A replay of an already-settled release is a
/// success carrying the original record, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Paid(PaidRecord),
    AlreadyPaid(PaidRecord),
}

impl ReleaseOutcome {
    pub fn record(&self) -> &PaidRecord {
        match self {
            ReleaseOutcome::Paid(record) | ReleaseOutcome::AlreadyPaid(record) => record,
        }
    }

    pub fn was_replay(&self) -> bool {
        matches!(self, ReleaseOutcome::AlreadyPaid(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    pub refunded: Decimal,
    pub remaining: Decimal,
    pub payment: PaymentDetails,
}

/// Owns the held/released/refunded state of a request's funds. The only
/// component permitted to mutate payment fields; everything else commands it.
pub struct EscrowLedger {
    requests: RequestStoreRef,
    orders: OrderStoreRef,
    gateway: PaymentGatewayRef,
    events: EventBusRef,
}

impl EscrowLedger {
    pub fn new(
        requests: RequestStoreRef,
        orders: OrderStoreRef,
        gateway: PaymentGatewayRef,
        events: EventBusRef,
    ) -> Self {
        Self {
            requests,
            orders,
            gateway,
            events,
        }
    }

    /// Takes custody of the customer's payment. Legal only while no funds
    /// are held; derives the designer payout quote once, here.
    pub async fn hold_funds(
        &self,
        request_id: &RequestId,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<PaymentDetails> {
        let request = self.must_get(request_id).await?;
        let total = request.payment.total_amount.value();

        match payment_type {
            PaymentType::Upfront if amount.value() != total => {
                return Err(EscrowError::Validation(format!(
                    "upfront hold of {amount} does not match total {total}"
                )));
            }
            PaymentType::HalfPayment if amount.value() * dec!(2) < total => {
                return Err(EscrowError::Validation(format!(
                    "half payment hold of {amount} is below half of {total}"
                )));
            }
            _ => {}
        }

        if !self
            .requests
            .cas_escrow_status(request_id, EscrowStatus::Pending, EscrowStatus::Held)
            .await?
        {
            let current = self.must_get(request_id).await?.payment.escrow_status;
            return Err(EscrowError::invalid_state("hold_funds", current));
        }

        let request = self.must_get(request_id).await?;
        let quote = request.designer_payout_quote();
        let mut payment = request.payment;
        payment.payment_type = payment_type;
        payment.record_payment(amount.value());
        payment.designer_payout_amount = Some(quote);
        self.requests.update_payment(request_id, payment.clone()).await?;

        info!(request = %request_id, %amount, "escrow hold placed");
        self.emit(DomainEvent::EscrowHeld {
            request_id: request_id.clone(),
            amount: amount.value(),
        })
        .await;

        Ok(payment)
    }

    /// Pays the designer their net share of the design fee. Requires an
    /// approval state; idempotent under at-least-once delivery.
    pub async fn release_designer_payment(&self, request_id: &RequestId) -> Result<ReleaseOutcome> {
        let request = self.must_get(request_id).await?;
        let payment = &request.payment;

        if payment.escrow_status == EscrowStatus::Frozen {
            return Err(EscrowError::EscrowFrozen);
        }
        if let Some(record) = payment.designer_leg.paid_record() {
            debug!(request = %request_id, "designer leg already paid, treating as success");
            return Ok(ReleaseOutcome::AlreadyPaid(*record));
        }
        if payment.escrow_status != EscrowStatus::Held {
            return Err(EscrowError::invalid_state(
                "release_designer_payment",
                payment.escrow_status,
            ));
        }
        if !request.status.is_releasable() {
            return Err(EscrowError::invalid_state(
                "release_designer_payment",
                request.status,
            ));
        }

        let gross = payment.designer_gross_due();
        let record = PaidRecord {
            at: Utc::now(),
            gross,
            net: commission::net_of_commission(gross),
        };

        // Claim-then-verify: the store only writes the record if the leg is
        // still unpaid. Losing a race is a successful replay.
        match self
            .requests
            .claim_leg(request_id, LegKind::Designer, record)
            .await?
        {
            ClaimOutcome::AlreadyPaid(existing) => Ok(ReleaseOutcome::AlreadyPaid(existing)),
            ClaimOutcome::Claimed => {
                self.settle_if_exhausted(request_id).await?;
                info!(request = %request_id, gross = %record.gross, net = %record.net, "designer payout released");
                self.emit(DomainEvent::DesignerPaid {
                    request_id: request_id.clone(),
                    gross: record.gross,
                    net: record.net,
                })
                .await;
                Ok(ReleaseOutcome::Paid(record))
            }
        }
    }

    /// Pays the shop its share. Gated on completed production, a shipped or
    /// delivered order, and the designer leg having settled first.
    pub async fn release_shop_payment(&self, request_id: &RequestId) -> Result<ReleaseOutcome> {
        let request = self.must_get(request_id).await?;
        let payment = &request.payment;

        if payment.escrow_status == EscrowStatus::Frozen {
            return Err(EscrowError::EscrowFrozen);
        }
        if let Some(record) = payment.shop_leg.paid_record() {
            debug!(request = %request_id, "shop leg already paid, treating as success");
            return Ok(ReleaseOutcome::AlreadyPaid(*record));
        }
        // Shop payout never precedes designer payout, whatever production
        // says.
        if !payment.designer_leg.is_paid() {
            return Err(EscrowError::invalid_state(
                "release_shop_payment",
                "designer_unpaid",
            ));
        }
        if payment.escrow_status != EscrowStatus::Held {
            return Err(EscrowError::invalid_state(
                "release_shop_payment",
                payment.escrow_status,
            ));
        }
        match &request.production {
            Some(production) if production.is_completed() => {}
            Some(production) => {
                return Err(EscrowError::invalid_state(
                    "release_shop_payment",
                    production.status,
                ));
            }
            None => {
                return Err(EscrowError::invalid_state(
                    "release_shop_payment",
                    "no_production",
                ));
            }
        }
        let order_id = request.order_id.as_ref().ok_or_else(|| {
            EscrowError::invalid_state("release_shop_payment", "no_linked_order")
        })?;
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("order", order_id.as_str()))?;
        if !order.is_shipped_or_delivered() {
            return Err(EscrowError::invalid_state(
                "release_shop_payment",
                order.status,
            ));
        }

        let gross = payment.shop_gross_due();
        let record = PaidRecord {
            at: Utc::now(),
            gross,
            net: commission::net_of_commission(gross),
        };

        match self
            .requests
            .claim_leg(request_id, LegKind::Shop, record)
            .await?
        {
            ClaimOutcome::AlreadyPaid(existing) => Ok(ReleaseOutcome::AlreadyPaid(existing)),
            ClaimOutcome::Claimed => {
                self.settle_if_exhausted(request_id).await?;
                info!(request = %request_id, gross = %record.gross, net = %record.net, "shop payout released");
                self.emit(DomainEvent::ShopPaid {
                    request_id: request_id.clone(),
                    gross: record.gross,
                    net: record.net,
                })
                .await;
                Ok(ReleaseOutcome::Paid(record))
            }
        }
    }

    /// Held → Frozen. Called by the dispute engine as its first durable side
    /// effect when a dispute opens.
    pub async fn freeze_escrow(&self, request_id: &RequestId) -> Result<PaymentDetails> {
        self.must_get(request_id).await?;
        if !self
            .requests
            .cas_escrow_status(request_id, EscrowStatus::Held, EscrowStatus::Frozen)
            .await?
        {
            let current = self.must_get(request_id).await?.payment.escrow_status;
            return Err(EscrowError::invalid_state("freeze_escrow", current));
        }
        info!(request = %request_id, "escrow frozen");
        self.emit(DomainEvent::EscrowFrozen {
            request_id: request_id.clone(),
        })
        .await;
        Ok(self.must_get(request_id).await?.payment)
    }

    /// Frozen → Held. A no-op when the escrow already reached a non-frozen
    /// state, so every dispute-resolution path can call it unconditionally.
    pub async fn unfreeze_escrow(&self, request_id: &RequestId) -> Result<PaymentDetails> {
        let swapped = self
            .requests
            .cas_escrow_status(request_id, EscrowStatus::Frozen, EscrowStatus::Held)
            .await?;
        let payment = self.must_get(request_id).await?.payment;
        if swapped {
            info!(request = %request_id, "escrow unfrozen");
            self.emit(DomainEvent::EscrowUnfrozen {
                request_id: request_id.clone(),
            })
            .await;
        } else if payment.escrow_status == EscrowStatus::Pending {
            return Err(EscrowError::invalid_state(
                "unfreeze_escrow",
                payment.escrow_status,
            ));
        }
        Ok(payment)
    }

    /// Returns money to the customer, bounded by what was never paid out.
    /// The gateway instruction goes first; a gateway failure leaves the
    /// ledger untouched and is never retried here.
    pub async fn refund_escrow(&self, request_id: &RequestId, amount: Decimal) -> Result<RefundOutcome> {
        let request = self.must_get(request_id).await?;
        let payment = &request.payment;

        if !matches!(
            payment.escrow_status,
            EscrowStatus::Held | EscrowStatus::Frozen
        ) {
            return Err(EscrowError::invalid_state(
                "refund_escrow",
                payment.escrow_status,
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(EscrowError::Validation(format!(
                "refund amount must be positive, got {amount}"
            )));
        }
        let refundable = payment.remaining_pool();
        if amount > refundable {
            return Err(EscrowError::Validation(format!(
                "refund of {amount} exceeds refundable {refundable}"
            )));
        }

        match self.invoice_for(&request).await? {
            Some(invoice) => self.gateway.refund_invoice(&invoice, amount).await?,
            None => {
                warn!(request = %request_id, "no invoice on file; refund recorded ledger-side only")
            }
        }

        let mut payment = self.must_get(request_id).await?.payment;
        payment.refunded_amount += amount;
        if let Some(terminal) = payment.terminal_status() {
            payment.escrow_status = terminal;
        }
        self.requests
            .update_payment(request_id, payment.clone())
            .await?;

        let remaining = payment.remaining_pool();
        info!(request = %request_id, %amount, %remaining, "escrow refunded");
        self.emit(DomainEvent::EscrowRefunded {
            request_id: request_id.clone(),
            amount,
            remaining,
        })
        .await;

        Ok(RefundOutcome {
            refunded: amount,
            remaining,
            payment,
        })
    }

    /// Moves a held escrow to its terminal status once every peso is
    /// accounted for.
    async fn settle_if_exhausted(&self, request_id: &RequestId) -> Result<()> {
        let payment = self.must_get(request_id).await?.payment;
        if payment.escrow_status == EscrowStatus::Held
            && let Some(terminal) = payment.terminal_status()
        {
            self.requests
                .cas_escrow_status(request_id, EscrowStatus::Held, terminal)
                .await?;
        }
        Ok(())
    }

    async fn invoice_for(&self, request: &CustomizationRequest) -> Result<Option<InvoiceRef>> {
        let Some(order_id) = &request.order_id else {
            return Ok(None);
        };
        Ok(self
            .orders
            .get(order_id)
            .await?
            .and_then(|order| order.invoice))
    }

    async fn must_get(&self, request_id: &RequestId) -> Result<CustomizationRequest> {
        self.requests
            .get(request_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("customization request", request_id.as_str()))
    }

    async fn emit(&self, event: DomainEvent) {
        // State truth lives in the store; a lost event is logged, not rolled
        // back.
        if let Err(error) = self.events.emit(event).await {
            warn!(%error, "event emission failed");
        }
    }
}
