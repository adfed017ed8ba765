use super::ids::{DisputeId, OrderId, PartyId, RequestId};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What the dispute is filed against. Exactly one of order/request; the
/// two-option input shape is validated away at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisputeTarget {
    Order { order_id: OrderId },
    Request { request_id: RequestId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeCategory {
    QualityIssue,
    NonDelivery,
    Misconduct,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStage {
    Filed,
    PartialRefundOffered,
    Resolved,
    Cancelled,
}

impl fmt::Display for DisputeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisputeStage::Filed => "filed",
            DisputeStage::PartialRefundOffered => "partial_refund_offered",
            DisputeStage::Resolved => "resolved",
            DisputeStage::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Offered,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRefundOffer {
    pub amount: Decimal,
    pub state: OfferState,
    pub offered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    FullRefund,
    PartialRefund,
    /// Dispute rejected; funds resume their originally planned path.
    Rejected,
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionOutcome::FullRefund => "full_refund",
            ResolutionOutcome::PartialRefund => "partial_refund",
            ResolutionOutcome::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub reason: String,
    pub partial_refund_amount: Option<Decimal>,
    pub issue_strike: bool,
    pub admin_notes: Option<String>,
    pub resolved_by: PartyId,
    pub resolved_at: DateTime<Utc>,
}

/// A dispute references escrowed funds it does not own; it only commands the
/// escrow ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub filed_by: PartyId,
    pub accused_party: PartyId,
    pub target: DisputeTarget,
    pub category: DisputeCategory,
    pub description: String,
    pub stage: DisputeStage,
    pub status: DisputeStatus,
    /// Set when the filer rejects a partial-refund offer; the dispute is back
    /// in `Filed` awaiting an admin.
    pub escalated: bool,
    pub partial_refund_offer: Option<PartialRefundOffer>,
    pub resolution: Option<Resolution>,
    pub filed_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn is_open(&self) -> bool {
        self.status == DisputeStatus::Open
    }

    pub fn close(&mut self, stage: DisputeStage) {
        self.stage = stage;
        self.status = DisputeStatus::Closed;
        self.closed_at = Some(Utc::now());
    }
}

/// Boundary input for filing a dispute. Carries both optional targets the
/// way callers submit them; `target()` enforces exactly-one.
#[derive(Debug, Clone, Deserialize)]
pub struct FileDispute {
    pub filed_by: PartyId,
    pub accused_party: PartyId,
    pub order_id: Option<OrderId>,
    pub customization_request_id: Option<RequestId>,
    pub category: DisputeCategory,
    pub description: String,
}

impl FileDispute {
    pub fn target(&self) -> Result<DisputeTarget> {
        match (&self.order_id, &self.customization_request_id) {
            (Some(order_id), None) => Ok(DisputeTarget::Order {
                order_id: order_id.clone(),
            }),
            (None, Some(request_id)) => Ok(DisputeTarget::Request {
                request_id: request_id.clone(),
            }),
            _ => Err(EscrowError::Validation(
                "a dispute must reference exactly one of order or customization request"
                    .to_string(),
            )),
        }
    }

    pub fn into_dispute(self) -> Result<Dispute> {
        let target = self.target()?;
        Ok(Dispute {
            id: DisputeId::generate(),
            filed_by: self.filed_by,
            accused_party: self.accused_party,
            target,
            category: self.category,
            description: self.description,
            stage: DisputeStage::Filed,
            status: DisputeStatus::Open,
            escalated: false,
            partial_refund_offer: None,
            resolution: None,
            filed_at: Utc::now(),
            closed_at: None,
        })
    }
}

/// Appended to a designer/shop profile as a dispute-resolution side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strike {
    pub id: Uuid,
    pub party_id: PartyId,
    pub dispute_id: DisputeId,
    pub reason: String,
    pub issued_by: PartyId,
    pub issued_at: DateTime<Utc>,
}

impl Strike {
    pub fn new(party_id: PartyId, dispute_id: DisputeId, reason: String, issued_by: PartyId) -> Self {
        Self {
            id: Uuid::new_v4(),
            party_id,
            dispute_id,
            reason,
            issued_by,
            issued_at: Utc::now(),
        }
    }
}
