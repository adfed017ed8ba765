use crate::domain::order::Order;
use crate::domain::request::{CustomizationRequest, PayoutLeg, Settlement};
use crate::error::Result;
use rust_decimal::Decimal;
use std::io::Write;

/// Writes the final ledger state as CSV: one requests table, one orders
/// table. Decimals are normalized so `920.00` prints as `920`.
pub struct LedgerWriter<W: Write> {
    writer: W,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_requests(&mut self, requests: &[CustomizationRequest]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut self.writer);
        csv_writer.write_record([
            "request",
            "status",
            "total",
            "design_fee",
            "paid",
            "escrow",
            "designer_net",
            "shop_net",
            "refunded",
            "settlement",
        ])?;
        for request in requests {
            let payment = &request.payment;
            csv_writer.write_record([
                request.id.as_str().to_string(),
                request.status.to_string(),
                display(payment.total_amount.value()),
                display(payment.design_fee.value()),
                display(payment.paid_amount),
                payment.escrow_status.to_string(),
                leg_net(&payment.designer_leg),
                leg_net(&payment.shop_leg),
                display(payment.refunded_amount),
                settlement_label(payment.settlement()),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_orders(&mut self, orders: &[Order]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut self.writer);
        csv_writer.write_record(["order", "kind", "status", "payment_status", "paid"])?;
        for order in orders {
            csv_writer.write_record([
                order.id.as_str().to_string(),
                match order.kind {
                    crate::domain::order::OrderKind::DesignOnly => "design".to_string(),
                    crate::domain::order::OrderKind::CustomProduct => "custom".to_string(),
                },
                order.status.to_string(),
                order.payment_status.to_string(),
                display(order.paid_amount),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn display(value: Decimal) -> String {
    value.normalize().to_string()
}

fn leg_net(leg: &PayoutLeg) -> String {
    match leg.paid_record() {
        Some(record) => display(record.net),
        None => "-".to_string(),
    }
}

fn settlement_label(settlement: Settlement) -> String {
    match settlement {
        Settlement::Open => "open".to_string(),
        Settlement::PaidOut => "paid_out".to_string(),
        Settlement::FullyRefunded => "fully_refunded".to_string(),
        Settlement::Split { .. } => "split".to_string(),
    }
}
