mod common;

use atelier_escrow::application::reconciler::WebhookPayload;
use atelier_escrow::domain::ids::InvoiceRef;
use atelier_escrow::domain::order::OrderStatus;
use atelier_escrow::domain::ports::{EarningsStore, InvoiceStatus, OrderStore, RequestStore};
use atelier_escrow::domain::request::{EscrowStatus, PaymentStatus};
use atelier_escrow::error::EscrowError;
use common::{harness, seed_custom_order, seed_design_order, seed_request};
use rust_decimal_macros::dec;

fn paid_webhook(order: &str, invoice: &str, amount: rust_decimal::Decimal) -> WebhookPayload {
    WebhookPayload {
        invoice_id: invoice.to_string(),
        external_id: order.to_string(),
        status: InvoiceStatus::Paid,
        amount,
    }
}

#[tokio::test]
async fn test_paid_webhook_moves_custom_order_to_processing_and_holds_escrow() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;

    let report = h
        .reconciler
        .handle_webhook(paid_webhook("o-1", "inv-1", dec!(1000)))
        .await
        .unwrap();
    assert!(report.was_updated);
    assert_eq!(report.order_status, OrderStatus::Processing);
    assert_eq!(report.payment_status, PaymentStatus::FullyPaid);

    let payment = h.requests.get(&request_id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Held);
    assert_eq!(payment.paid_amount, dec!(1000));
}

#[tokio::test]
async fn test_webhook_replay_is_a_no_op() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;

    let first = h
        .reconciler
        .handle_webhook(paid_webhook("o-1", "inv-1", dec!(1000)))
        .await
        .unwrap();
    let second = h
        .reconciler
        .handle_webhook(paid_webhook("o-1", "inv-1", dec!(1000)))
        .await
        .unwrap();

    assert!(first.was_updated);
    assert!(!second.was_updated);
    assert_eq!(second.order_status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_design_only_order_delivers_and_records_earnings_once() {
    let h = harness();
    let order_id = seed_design_order(&h, "o-1", dec!(500), "inv-1").await;

    h.reconciler
        .handle_webhook(paid_webhook("o-1", "inv-1", dec!(500)))
        .await
        .unwrap();
    // Replayed delivery.
    h.reconciler
        .handle_webhook(paid_webhook("o-1", "inv-1", dec!(500)))
        .await
        .unwrap();

    let order = h.orders.get(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    let earning = h.earnings.for_order(&order_id).await.unwrap().unwrap();
    assert_eq!(earning.gross, dec!(500));
    assert_eq!(earning.commission, dec!(40.00));
    assert_eq!(earning.net, dec!(460.00));
}

#[tokio::test]
async fn test_manual_verification_converges_like_a_webhook() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    let order_id = seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;
    h.gateway
        .seed_invoice(InvoiceRef::from("inv-1"), InvoiceStatus::Paid, dec!(1000))
        .await;

    let report = h.reconciler.verify_payment(&order_id).await.unwrap();
    assert!(report.was_updated);
    assert_eq!(report.invoice_status, InvoiceStatus::Paid);
    assert_eq!(report.order_status, OrderStatus::Processing);

    // The pull path is just as idempotent as the push path.
    let replay = h.reconciler.verify_payment(&order_id).await.unwrap();
    assert!(!replay.was_updated);
}

#[tokio::test]
async fn test_pending_invoice_updates_nothing() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    let order_id = seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;
    h.gateway
        .seed_invoice(InvoiceRef::from("inv-1"), InvoiceStatus::Pending, dec!(1000))
        .await;

    let report = h.reconciler.verify_payment(&order_id).await.unwrap();
    assert!(!report.was_updated);
    assert_eq!(report.order_status, OrderStatus::PendingPayment);
    assert_eq!(report.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_failed_invoice_cancels_pending_order() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;

    let report = h
        .reconciler
        .handle_webhook(WebhookPayload {
            invoice_id: "inv-1".to_string(),
            external_id: "o-1".to_string(),
            status: InvoiceStatus::Failed,
            amount: dec!(1000),
        })
        .await
        .unwrap();

    assert!(report.was_updated);
    assert_eq!(report.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_gateway_outage_surfaces_and_is_not_retried() {
    let h = harness();
    let request_id = seed_request(&h, "r-1", dec!(1000), dec!(600)).await;
    let order_id = seed_custom_order(&h, "o-1", &request_id, dec!(1000), "inv-1").await;
    h.gateway
        .seed_invoice(InvoiceRef::from("inv-1"), InvoiceStatus::Paid, dec!(1000))
        .await;

    h.gateway.fail_next_call().await;
    assert!(matches!(
        h.reconciler.verify_payment(&order_id).await,
        Err(EscrowError::GatewayUnavailable(_))
    ));

    // Nothing was applied during the outage; the caller's retry converges.
    let order = h.orders.get(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let report = h.reconciler.verify_payment(&order_id).await.unwrap();
    assert!(report.was_updated);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_surfaced() {
    let h = harness();
    assert!(matches!(
        h.reconciler
            .handle_webhook(paid_webhook("ghost", "inv-9", dec!(10)))
            .await,
        Err(EscrowError::NotFound { .. })
    ));
}
