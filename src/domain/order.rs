use super::ids::{InvoiceRef, OrderId, PartyId, RequestId};
use super::money::Amount;
use super::request::PaymentStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// An existing design sold as-is; delivered the moment payment lands.
    DesignOnly,
    /// A customization request headed for a print shop.
    CustomProduct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: PartyId,
    pub designer_id: Option<PartyId>,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Amount,
    pub paid_amount: Decimal,
    pub invoice: Option<InvoiceRef>,
    /// Present for `CustomProduct` orders; links the escrowed request.
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(id: OrderId, customer_id: PartyId, kind: OrderKind, total_amount: Amount) -> Self {
        Self {
            id,
            customer_id,
            designer_id: None,
            kind,
            status: OrderStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            total_amount,
            paid_amount: Decimal::ZERO,
            invoice: None,
            request_id: None,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
        }
    }

    pub fn is_shipped_or_delivered(&self) -> bool {
        matches!(self.status, OrderStatus::Shipped | OrderStatus::Delivered)
    }
}

/// Record of a designer's cut from a design-only sale. Written once per
/// order; the reconciler checks for an existing record before writing so
/// webhook replays cannot double-count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignerEarning {
    pub id: Uuid,
    pub order_id: OrderId,
    pub designer_id: PartyId,
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl DesignerEarning {
    pub fn new(order_id: OrderId, designer_id: PartyId, gross: Decimal) -> Self {
        let commission = gross * super::commission::COMMISSION_RATE;
        Self {
            id: Uuid::new_v4(),
            order_id,
            designer_id,
            gross,
            commission,
            net: gross - commission,
            recorded_at: Utc::now(),
        }
    }
}
