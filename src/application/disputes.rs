use super::escrow::EscrowLedger;
use crate::domain::dispute::{
    Dispute, DisputeStage, DisputeTarget, FileDispute, OfferState, PartialRefundOffer, Resolution,
    ResolutionOutcome, Strike,
};
use crate::domain::events::DomainEvent;
use crate::domain::ids::{DisputeId, PartyId, RequestId};
use crate::domain::ports::{
    DisputeStoreRef, EventBusRef, OrderStoreRef, RequestStoreRef, StrikeStoreRef,
};
use crate::domain::request::EscrowStatus;
use crate::error::{EscrowError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A partial-refund offer expressed either as an absolute amount or as a
/// percentage of the funds still held.
#[derive(Debug, Clone, Copy)]
pub enum RefundOffer {
    Amount(Decimal),
    Percentage(Decimal),
}

/// Admin input for `resolve_dispute`.
#[derive(Debug, Clone)]
pub struct ResolveDispute {
    pub outcome: ResolutionOutcome,
    pub reason: String,
    pub partial_refund_amount: Option<Decimal>,
    pub issue_strike: bool,
    pub admin_notes: Option<String>,
}

/// State machine for customer/shop/designer conflicts. Never touches payment
/// fields directly; it commands the escrow ledger and the strike store.
pub struct DisputeEngine {
    disputes: DisputeStoreRef,
    requests: RequestStoreRef,
    orders: OrderStoreRef,
    strikes: StrikeStoreRef,
    escrow: Arc<EscrowLedger>,
    events: EventBusRef,
}

impl DisputeEngine {
    pub fn new(
        disputes: DisputeStoreRef,
        requests: RequestStoreRef,
        orders: OrderStoreRef,
        strikes: StrikeStoreRef,
        escrow: Arc<EscrowLedger>,
        events: EventBusRef,
    ) -> Self {
        Self {
            disputes,
            requests,
            orders,
            strikes,
            escrow,
            events,
        }
    }

    /// Opens a dispute. Freeze-before-record: the escrow freeze is the first
    /// durable side effect, so a crash mid-filing can never leave funds
    /// claimable while a dispute is in flight.
    pub async fn file_dispute(&self, input: FileDispute) -> Result<Dispute> {
        let dispute = input.into_dispute()?;
        let request_id = self.escrowed_request(&dispute.target).await?;

        let request = self
            .requests
            .get(&request_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("customization request", request_id.as_str()))?;
        if !request.is_party(&dispute.filed_by) {
            return Err(EscrowError::Forbidden(format!(
                "{} is not a party to {}",
                dispute.filed_by, request_id
            )));
        }
        if request.payment.escrow_status != EscrowStatus::Held {
            return Err(EscrowError::NothingToDispute(
                request.payment.escrow_status.to_string(),
            ));
        }
        if let Some(existing) = self.disputes.open_for_target(&dispute.target).await? {
            return Err(EscrowError::invalid_state(
                "file_dispute",
                format!("dispute {} already open", existing.id),
            ));
        }

        self.escrow.freeze_escrow(&request_id).await?;
        self.disputes.insert(dispute.clone()).await?;

        info!(dispute = %dispute.id, request = %request_id, "dispute filed");
        self.emit(DomainEvent::DisputeFiled {
            dispute_id: dispute.id,
            target: dispute.target.clone(),
        })
        .await;

        Ok(dispute)
    }

    /// The accused concedes: full refund of whatever is still held. The
    /// terminal refunded state leaves nothing frozen.
    pub async fn accept_dispute(&self, dispute_id: &DisputeId, accused_id: &PartyId) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        self.ensure_stage(&dispute, DisputeStage::Filed, "accept_dispute")?;
        if &dispute.accused_party != accused_id {
            return Err(EscrowError::Forbidden(format!(
                "{accused_id} is not the accused party"
            )));
        }

        let request_id = self.escrowed_request(&dispute.target).await?;
        let held = self.held_amount(&request_id).await?;
        self.escrow.refund_escrow(&request_id, held).await?;
        self.escrow.unfreeze_escrow(&request_id).await?;

        dispute.resolution = Some(Resolution {
            outcome: ResolutionOutcome::FullRefund,
            reason: "accepted by accused party".to_string(),
            partial_refund_amount: None,
            issue_strike: false,
            admin_notes: None,
            resolved_by: accused_id.clone(),
            resolved_at: Utc::now(),
        });
        dispute.close(DisputeStage::Resolved);
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, "dispute accepted, full refund issued");
        self.emit(DomainEvent::DisputeResolved {
            dispute_id: *dispute_id,
            outcome: ResolutionOutcome::FullRefund,
        })
        .await;

        Ok(dispute)
    }

    /// The accused proposes keeping part of the funds. Validated against the
    /// held amount; no money moves until the filer accepts.
    pub async fn offer_partial_refund(
        &self,
        dispute_id: &DisputeId,
        accused_id: &PartyId,
        offer: RefundOffer,
    ) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        self.ensure_stage(&dispute, DisputeStage::Filed, "offer_partial_refund")?;
        if &dispute.accused_party != accused_id {
            return Err(EscrowError::Forbidden(format!(
                "{accused_id} is not the accused party"
            )));
        }

        let request_id = self.escrowed_request(&dispute.target).await?;
        let held = self.held_amount(&request_id).await?;
        let amount = match offer {
            RefundOffer::Amount(amount) => amount,
            RefundOffer::Percentage(percent) => {
                if percent <= Decimal::ZERO || percent > dec!(100) {
                    return Err(EscrowError::Validation(format!(
                        "offer percentage must be in (0, 100], got {percent}"
                    )));
                }
                held * percent / dec!(100)
            }
        };
        if amount <= Decimal::ZERO || amount > held {
            return Err(EscrowError::Validation(format!(
                "offer of {amount} outside the held amount {held}"
            )));
        }

        dispute.partial_refund_offer = Some(PartialRefundOffer {
            amount,
            state: OfferState::Offered,
            offered_at: Utc::now(),
        });
        dispute.stage = DisputeStage::PartialRefundOffered;
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, %amount, "partial refund offered");
        self.emit(DomainEvent::PartialRefundOffered {
            dispute_id: *dispute_id,
            amount,
        })
        .await;

        Ok(dispute)
    }

    /// Filer accepts the offer: refund the offered amount, then the
    /// remainder flows back through the normal payout path.
    pub async fn accept_partial_refund(
        &self,
        dispute_id: &DisputeId,
        filer_id: &PartyId,
    ) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        self.ensure_stage(
            &dispute,
            DisputeStage::PartialRefundOffered,
            "accept_partial_refund",
        )?;
        self.ensure_filer(&dispute, filer_id)?;
        let offer = dispute.partial_refund_offer.clone().ok_or_else(|| {
            EscrowError::invalid_state("accept_partial_refund", "no_offer_recorded")
        })?;

        let request_id = self.escrowed_request(&dispute.target).await?;
        // Refund while still frozen, then hand the remainder back to the
        // normal lifecycle.
        self.escrow.refund_escrow(&request_id, offer.amount).await?;
        self.escrow.unfreeze_escrow(&request_id).await?;
        match self.escrow.release_designer_payment(&request_id).await {
            Ok(outcome) => {
                debug!(dispute = %dispute_id, net = %outcome.record().net, "remainder released to designer")
            }
            // Not releasable yet (or nothing left): the request simply
            // resumes its normal lifecycle.
            Err(EscrowError::InvalidState { current, .. }) => {
                debug!(dispute = %dispute_id, %current, "remainder left for the normal payout path")
            }
            Err(other) => return Err(other),
        }

        dispute.partial_refund_offer = Some(PartialRefundOffer {
            state: OfferState::Accepted,
            ..offer
        });
        dispute.resolution = Some(Resolution {
            outcome: ResolutionOutcome::PartialRefund,
            reason: "partial refund accepted by filer".to_string(),
            partial_refund_amount: Some(offer.amount),
            issue_strike: false,
            admin_notes: None,
            resolved_by: filer_id.clone(),
            resolved_at: Utc::now(),
        });
        dispute.close(DisputeStage::Resolved);
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, amount = %offer.amount, "partial refund accepted");
        self.emit(DomainEvent::DisputeResolved {
            dispute_id: *dispute_id,
            outcome: ResolutionOutcome::PartialRefund,
        })
        .await;

        Ok(dispute)
    }

    /// Filer rejects the offer: back to `Filed`, escalated for an admin, and
    /// the escrow stays frozen until one resolves it.
    pub async fn reject_partial_refund(
        &self,
        dispute_id: &DisputeId,
        filer_id: &PartyId,
    ) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        self.ensure_stage(
            &dispute,
            DisputeStage::PartialRefundOffered,
            "reject_partial_refund",
        )?;
        self.ensure_filer(&dispute, filer_id)?;

        if let Some(offer) = dispute.partial_refund_offer.as_mut() {
            offer.state = OfferState::Rejected;
        }
        dispute.stage = DisputeStage::Filed;
        dispute.escalated = true;
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, "partial refund rejected, escalated to admin");
        self.emit(DomainEvent::PartialRefundRejected {
            dispute_id: *dispute_id,
        })
        .await;

        Ok(dispute)
    }

    /// Admin-only terminal action. Every outcome path ends with the escrow
    /// out of the frozen state, so no dispute can park funds forever.
    pub async fn resolve_dispute(
        &self,
        dispute_id: &DisputeId,
        resolution: ResolveDispute,
        admin_id: &PartyId,
    ) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        if !dispute.is_open() {
            return Err(EscrowError::invalid_state(
                "resolve_dispute",
                dispute.stage,
            ));
        }

        let request_id = self.escrowed_request(&dispute.target).await?;
        let partial_refund_amount = match resolution.outcome {
            ResolutionOutcome::FullRefund => {
                let held = self.held_amount(&request_id).await?;
                self.escrow.refund_escrow(&request_id, held).await?;
                None
            }
            ResolutionOutcome::PartialRefund => {
                let amount = resolution.partial_refund_amount.ok_or_else(|| {
                    EscrowError::Validation(
                        "partial refund resolution requires an amount".to_string(),
                    )
                })?;
                self.escrow.refund_escrow(&request_id, amount).await?;
                Some(amount)
            }
            // Dispute rejected: funds resume their originally planned path.
            ResolutionOutcome::Rejected => None,
        };
        self.escrow.unfreeze_escrow(&request_id).await?;

        if resolution.issue_strike {
            let losing_party = match resolution.outcome {
                ResolutionOutcome::Rejected => dispute.filed_by.clone(),
                _ => dispute.accused_party.clone(),
            };
            let strike = Strike::new(
                losing_party.clone(),
                *dispute_id,
                resolution.reason.clone(),
                admin_id.clone(),
            );
            self.strikes.append(strike).await?;
            self.emit(DomainEvent::StrikeIssued {
                party_id: losing_party,
                dispute_id: *dispute_id,
            })
            .await;
        }

        dispute.resolution = Some(Resolution {
            outcome: resolution.outcome,
            reason: resolution.reason,
            partial_refund_amount,
            issue_strike: resolution.issue_strike,
            admin_notes: resolution.admin_notes,
            resolved_by: admin_id.clone(),
            resolved_at: Utc::now(),
        });
        dispute.close(DisputeStage::Resolved);
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, outcome = %resolution.outcome, "dispute resolved by admin");
        self.emit(DomainEvent::DisputeResolved {
            dispute_id: *dispute_id,
            outcome: resolution.outcome,
        })
        .await;

        Ok(dispute)
    }

    /// The filer withdraws before any response; the request returns to its
    /// pre-dispute state.
    pub async fn cancel_dispute(&self, dispute_id: &DisputeId, filer_id: &PartyId) -> Result<Dispute> {
        let mut dispute = self.must_get(dispute_id).await?;
        self.ensure_filer(&dispute, filer_id)?;
        if dispute.stage != DisputeStage::Filed
            || dispute.escalated
            || dispute.partial_refund_offer.is_some()
        {
            return Err(EscrowError::invalid_state("cancel_dispute", dispute.stage));
        }

        let request_id = self.escrowed_request(&dispute.target).await?;
        self.escrow.unfreeze_escrow(&request_id).await?;

        dispute.close(DisputeStage::Cancelled);
        self.disputes.update(dispute.clone()).await?;

        info!(dispute = %dispute_id, "dispute cancelled by filer");
        self.emit(DomainEvent::DisputeCancelled {
            dispute_id: *dispute_id,
        })
        .await;

        Ok(dispute)
    }

    /// Resolves a dispute target to the customization request holding the
    /// escrowed funds.
    async fn escrowed_request(&self, target: &DisputeTarget) -> Result<RequestId> {
        match target {
            DisputeTarget::Request { request_id } => Ok(request_id.clone()),
            DisputeTarget::Order { order_id } => {
                let order = self
                    .orders
                    .get(order_id)
                    .await?
                    .ok_or_else(|| EscrowError::not_found("order", order_id.as_str()))?;
                order.request_id.ok_or_else(|| {
                    EscrowError::NothingToDispute("order holds no escrowed funds".to_string())
                })
            }
        }
    }

    async fn held_amount(&self, request_id: &RequestId) -> Result<Decimal> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("customization request", request_id.as_str()))?;
        Ok(request.payment.remaining_pool())
    }

    fn ensure_stage(
        &self,
        dispute: &Dispute,
        expected: DisputeStage,
        operation: &'static str,
    ) -> Result<()> {
        if !dispute.is_open() || dispute.stage != expected {
            return Err(EscrowError::invalid_state(operation, dispute.stage));
        }
        Ok(())
    }

    fn ensure_filer(&self, dispute: &Dispute, party: &PartyId) -> Result<()> {
        if &dispute.filed_by != party {
            return Err(EscrowError::Forbidden(format!(
                "{party} did not file dispute {}",
                dispute.id
            )));
        }
        Ok(())
    }

    async fn must_get(&self, dispute_id: &DisputeId) -> Result<Dispute> {
        self.disputes
            .get(dispute_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("dispute", dispute_id.to_string()))
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(error) = self.events.emit(event).await {
            warn!(%error, "event emission failed");
        }
    }
}
