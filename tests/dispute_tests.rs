mod common;

use atelier_escrow::application::disputes::{RefundOffer, ResolveDispute};
use atelier_escrow::domain::dispute::{
    DisputeCategory, DisputeStage, DisputeStatus, FileDispute, OfferState, ResolutionOutcome,
};
use atelier_escrow::domain::ids::{OrderId, RequestId};
use atelier_escrow::domain::money::Amount;
use atelier_escrow::domain::ports::{RequestStore, StrikeStore};
use atelier_escrow::domain::request::{EscrowStatus, PaymentType, RequestStatus, Settlement};
use atelier_escrow::error::EscrowError;
use common::{admin, customer, designer, harness, seed_custom_order, seed_request, Harness};
use rust_decimal_macros::dec;

fn file_against_request(id: &RequestId) -> FileDispute {
    FileDispute {
        filed_by: customer(),
        accused_party: designer(),
        order_id: None,
        customization_request_id: Some(id.clone()),
        category: DisputeCategory::QualityIssue,
        description: "design does not match the brief".to_string(),
    }
}

async fn held_request(h: &Harness, total: rust_decimal::Decimal) -> RequestId {
    let id = seed_request(h, "r-1", total, total).await;
    h.escrow
        .hold_funds(&id, Amount::new(total).unwrap(), PaymentType::Upfront)
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_filing_freezes_escrow_first() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;

    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    assert_eq!(dispute.stage, DisputeStage::Filed);

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Frozen);
    assert!(matches!(
        h.escrow.release_designer_payment(&id).await,
        Err(EscrowError::EscrowFrozen)
    ));

    // Freeze lands before the dispute record does.
    let names = h.events.names().await;
    assert_eq!(names, vec!["escrow_held", "escrow_frozen", "dispute_filed"]);
}

#[tokio::test]
async fn test_cannot_dispute_released_or_unfunded_escrow() {
    let h = harness();
    let id = seed_request(&h, "r-1", dec!(1000), dec!(1000)).await;

    // Nothing held yet.
    assert!(matches!(
        h.dispute_engine.file_dispute(file_against_request(&id)).await,
        Err(EscrowError::NothingToDispute(_))
    ));

    h.escrow
        .hold_funds(&id, Amount::new(dec!(1000)).unwrap(), PaymentType::Upfront)
        .await
        .unwrap();
    h.requests
        .update_status(&id, RequestStatus::Approved)
        .await
        .unwrap();
    h.escrow.release_designer_payment(&id).await.unwrap();

    // Already paid out.
    assert!(matches!(
        h.dispute_engine.file_dispute(file_against_request(&id)).await,
        Err(EscrowError::NothingToDispute(_))
    ));
}

#[tokio::test]
async fn test_one_open_dispute_per_target() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;

    h.dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    assert!(matches!(
        h.dispute_engine.file_dispute(file_against_request(&id)).await,
        Err(EscrowError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_accept_dispute_refunds_everything_held() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    seed_custom_order(&h, "o-1", &id, dec!(1000), "inv-1").await;

    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    let resolved = h
        .dispute_engine
        .accept_dispute(&dispute.id, &designer())
        .await
        .unwrap();

    assert_eq!(resolved.status, DisputeStatus::Closed);
    assert_eq!(
        resolved.resolution.as_ref().unwrap().outcome,
        ResolutionOutcome::FullRefund
    );

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Refunded);
    assert_eq!(payment.settlement(), Settlement::FullyRefunded);

    // The refund instruction reached the gateway.
    let refunds = h.gateway.refunds().await;
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].1, dec!(1000));
}

#[tokio::test]
async fn test_accept_dispute_requires_the_accused() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();

    assert!(matches!(
        h.dispute_engine.accept_dispute(&dispute.id, &customer()).await,
        Err(EscrowError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_partial_refund_offer_validated_against_held_amount() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();

    assert!(matches!(
        h.dispute_engine
            .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Amount(dec!(1500)))
            .await,
        Err(EscrowError::Validation(_))
    ));
    assert!(matches!(
        h.dispute_engine
            .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Percentage(dec!(150)))
            .await,
        Err(EscrowError::Validation(_))
    ));

    let offered = h
        .dispute_engine
        .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Percentage(dec!(50)))
        .await
        .unwrap();
    assert_eq!(offered.stage, DisputeStage::PartialRefundOffered);
    assert_eq!(
        offered.partial_refund_offer.as_ref().unwrap().amount,
        dec!(500.00)
    );

    // No money moved yet.
    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.refunded_amount, dec!(0));
    assert_eq!(payment.escrow_status, EscrowStatus::Frozen);
}

#[tokio::test]
async fn test_accepted_partial_refund_splits_the_funds() {
    let h = harness();
    let id = seed_request(&h, "r-1", dec!(1000), dec!(1000)).await;
    seed_custom_order(&h, "o-1", &id, dec!(1000), "inv-1").await;
    h.escrow
        .hold_funds(&id, Amount::new(dec!(1000)).unwrap(), PaymentType::Upfront)
        .await
        .unwrap();
    h.requests
        .update_status(&id, RequestStatus::Approved)
        .await
        .unwrap();

    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    h.dispute_engine
        .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Amount(dec!(500)))
        .await
        .unwrap();
    let resolved = h
        .dispute_engine
        .accept_partial_refund(&dispute.id, &customer())
        .await
        .unwrap();

    assert_eq!(resolved.status, DisputeStatus::Closed);
    assert_eq!(
        resolved.partial_refund_offer.as_ref().unwrap().state,
        OfferState::Accepted
    );

    // 500 back to the customer, the remaining 500 released to the designer
    // through the normal payout path.
    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.refunded_amount, dec!(500));
    assert_eq!(
        payment.designer_leg.paid_record().unwrap().net,
        dec!(460.00)
    );
    assert_eq!(payment.escrow_status, EscrowStatus::Released);
    assert_eq!(
        payment.settlement(),
        Settlement::Split {
            paid_out: dec!(500),
            refunded: dec!(500),
        }
    );
}

#[tokio::test]
async fn test_rejected_offer_escalates_and_keeps_funds_frozen() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    h.dispute_engine
        .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Amount(dec!(200)))
        .await
        .unwrap();

    let rejected = h
        .dispute_engine
        .reject_partial_refund(&dispute.id, &customer())
        .await
        .unwrap();
    assert_eq!(rejected.stage, DisputeStage::Filed);
    assert!(rejected.escalated);
    assert_eq!(
        rejected.partial_refund_offer.as_ref().unwrap().state,
        OfferState::Rejected
    );

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Frozen);

    // Escalation closes the filer's cancellation window.
    assert!(matches!(
        h.dispute_engine.cancel_dispute(&dispute.id, &customer()).await,
        Err(EscrowError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_admin_rejection_unfreezes_and_strikes_the_filer() {
    let h = harness();
    let id = seed_request(&h, "r-1", dec!(1000), dec!(1000)).await;
    h.escrow
        .hold_funds(&id, Amount::new(dec!(1000)).unwrap(), PaymentType::Upfront)
        .await
        .unwrap();
    h.requests
        .update_status(&id, RequestStatus::Approved)
        .await
        .unwrap();

    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    let resolved = h
        .dispute_engine
        .resolve_dispute(
            &dispute.id,
            ResolveDispute {
                outcome: ResolutionOutcome::Rejected,
                reason: "no defect found".to_string(),
                partial_refund_amount: None,
                issue_strike: true,
                admin_notes: Some("filer has a pattern of frivolous disputes".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Closed);

    // Funds resume their planned path.
    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Held);
    assert!(h.escrow.release_designer_payment(&id).await.is_ok());

    let strikes = h.strikes.for_party(&customer()).await.unwrap();
    assert_eq!(strikes.len(), 1);
    assert_eq!(strikes[0].dispute_id, dispute.id);
    assert!(h.strikes.for_party(&designer()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_partial_refund_resolution() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    seed_custom_order(&h, "o-1", &id, dec!(1000), "inv-1").await;

    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();
    h.dispute_engine
        .resolve_dispute(
            &dispute.id,
            ResolveDispute {
                outcome: ResolutionOutcome::PartialRefund,
                reason: "minor defect".to_string(),
                partial_refund_amount: Some(dec!(300)),
                issue_strike: true,
                admin_notes: None,
            },
            &admin(),
        )
        .await
        .unwrap();

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.refunded_amount, dec!(300));
    // The remainder is back on the normal path, not frozen.
    assert_eq!(payment.escrow_status, EscrowStatus::Held);

    // Losing accused party takes the strike.
    assert_eq!(h.strikes.for_party(&designer()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_returns_request_to_pre_dispute_state() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let dispute = h
        .dispute_engine
        .file_dispute(file_against_request(&id))
        .await
        .unwrap();

    assert!(matches!(
        h.dispute_engine.cancel_dispute(&dispute.id, &designer()).await,
        Err(EscrowError::Forbidden(_))
    ));

    let cancelled = h
        .dispute_engine
        .cancel_dispute(&dispute.id, &customer())
        .await
        .unwrap();
    assert_eq!(cancelled.stage, DisputeStage::Cancelled);
    assert_eq!(cancelled.status, DisputeStatus::Closed);

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Held);

    // A fresh dispute can be filed afterwards.
    assert!(
        h.dispute_engine
            .file_dispute(file_against_request(&id))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_every_terminal_stage_leaves_escrow_unfrozen() {
    // accept, partial accept, admin resolve, cancel: none may leave the
    // escrow frozen.
    for terminal in ["accept", "partial", "resolve", "cancel"] {
        let h = harness();
        let id = seed_request(&h, "r-1", dec!(1000), dec!(1000)).await;
        seed_custom_order(&h, "o-1", &id, dec!(1000), "inv-1").await;
        h.escrow
            .hold_funds(&id, Amount::new(dec!(1000)).unwrap(), PaymentType::Upfront)
            .await
            .unwrap();
        h.requests
            .update_status(&id, RequestStatus::Approved)
            .await
            .unwrap();
        let dispute = h
            .dispute_engine
            .file_dispute(file_against_request(&id))
            .await
            .unwrap();

        match terminal {
            "accept" => {
                h.dispute_engine
                    .accept_dispute(&dispute.id, &designer())
                    .await
                    .unwrap();
            }
            "partial" => {
                h.dispute_engine
                    .offer_partial_refund(&dispute.id, &designer(), RefundOffer::Amount(dec!(100)))
                    .await
                    .unwrap();
                h.dispute_engine
                    .accept_partial_refund(&dispute.id, &customer())
                    .await
                    .unwrap();
            }
            "resolve" => {
                h.dispute_engine
                    .resolve_dispute(
                        &dispute.id,
                        ResolveDispute {
                            outcome: ResolutionOutcome::FullRefund,
                            reason: "defective".to_string(),
                            partial_refund_amount: None,
                            issue_strike: false,
                            admin_notes: None,
                        },
                        &admin(),
                    )
                    .await
                    .unwrap();
            }
            "cancel" => {
                h.dispute_engine
                    .cancel_dispute(&dispute.id, &customer())
                    .await
                    .unwrap();
            }
            _ => unreachable!(),
        }

        let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
        assert_ne!(
            payment.escrow_status,
            EscrowStatus::Frozen,
            "terminal path {terminal:?} left escrow frozen"
        );
    }
}

#[tokio::test]
async fn test_order_targeted_dispute_resolves_to_linked_request() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let order_id = seed_custom_order(&h, "o-1", &id, dec!(1000), "inv-1").await;

    let dispute = h
        .dispute_engine
        .file_dispute(FileDispute {
            filed_by: customer(),
            accused_party: designer(),
            order_id: Some(order_id),
            customization_request_id: None,
            category: DisputeCategory::NonDelivery,
            description: "order never arrived".to_string(),
        })
        .await
        .unwrap();

    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Frozen);

    h.dispute_engine
        .accept_dispute(&dispute.id, &designer())
        .await
        .unwrap();
    let payment = h.requests.get(&id).await.unwrap().unwrap().payment;
    assert_eq!(payment.escrow_status, EscrowStatus::Refunded);
}

#[tokio::test]
async fn test_dispute_requires_a_party_filer() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;

    let result = h
        .dispute_engine
        .file_dispute(FileDispute {
            filed_by: atelier_escrow::domain::ids::PartyId::from("stranger"),
            accused_party: designer(),
            order_id: None,
            customization_request_id: Some(id),
            category: DisputeCategory::Other,
            description: "unrelated complaint".to_string(),
        })
        .await;
    assert!(matches!(result, Err(EscrowError::Forbidden(_))));
}

#[tokio::test]
async fn test_dispute_target_must_be_exactly_one() {
    let h = harness();
    let id = held_request(&h, dec!(1000)).await;
    let order_id = OrderId::from("o-1");

    let result = h
        .dispute_engine
        .file_dispute(FileDispute {
            filed_by: customer(),
            accused_party: designer(),
            order_id: Some(order_id),
            customization_request_id: Some(id),
            category: DisputeCategory::Other,
            description: "ambiguous".to_string(),
        })
        .await;
    assert!(matches!(result, Err(EscrowError::Validation(_))));
}
