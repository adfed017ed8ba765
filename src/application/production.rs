use super::escrow::EscrowLedger;
use crate::domain::events::DomainEvent;
use crate::domain::ids::{OrderId, PartyId, RequestId};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{EventBusRef, OrderStoreRef, RequestStoreRef};
use crate::domain::production::ProductionDetails;
use crate::domain::request::{CustomizationRequest, RequestStatus};
use crate::error::{EscrowError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State machine for physical fulfillment. Completion gates the shop payout;
/// the ship/deliver transitions are what actually trigger it.
pub struct ProductionTracker {
    requests: RequestStoreRef,
    orders: OrderStoreRef,
    escrow: Arc<EscrowLedger>,
    events: EventBusRef,
}

impl ProductionTracker {
    pub fn new(
        requests: RequestStoreRef,
        orders: OrderStoreRef,
        escrow: Arc<EscrowLedger>,
        events: EventBusRef,
    ) -> Self {
        Self {
            requests,
            orders,
            escrow,
            events,
        }
    }

    /// A shop takes the job. Requires an approved design and enough of the
    /// price paid in.
    pub async fn confirm_production(
        &self,
        request_id: &RequestId,
        shop_id: &PartyId,
    ) -> Result<CustomizationRequest> {
        let request = self.must_get(request_id).await?;

        if !matches!(
            request.status,
            RequestStatus::Approved | RequestStatus::AutoApproved
        ) {
            return Err(EscrowError::invalid_state(
                "confirm_production",
                request.status,
            ));
        }
        if request.production.is_some() {
            return Err(EscrowError::invalid_state(
                "confirm_production",
                "production_already_confirmed",
            ));
        }
        if !request.payment.is_sufficient_for_production() {
            return Err(EscrowError::invalid_state(
                "confirm_production",
                request.payment.payment_status,
            ));
        }
        if let Some(assigned) = &request.printing_shop_id
            && assigned != shop_id
        {
            return Err(EscrowError::Forbidden(format!(
                "{shop_id} is not the shop assigned to {request_id}"
            )));
        }

        let production = ProductionDetails::new(shop_id.clone());
        if request.printing_shop_id.is_none() {
            self.requests.set_shop(request_id, shop_id).await?;
        }
        self.requests
            .update_production(request_id, production)
            .await?;
        self.requests
            .update_status(request_id, RequestStatus::InProduction)
            .await?;

        info!(request = %request_id, shop = %shop_id, "production confirmed");
        self.emit(DomainEvent::ProductionConfirmed {
            request_id: request_id.clone(),
            shop_id: shop_id.clone(),
        })
        .await;

        self.must_get(request_id).await
    }

    pub async fn start_production(
        &self,
        request_id: &RequestId,
        shop_id: &PartyId,
    ) -> Result<CustomizationRequest> {
        let request = self.must_get(request_id).await?;
        let mut production = self.owned_production(&request, shop_id)?;
        production.start()?;
        self.requests
            .update_production(request_id, production)
            .await?;

        info!(request = %request_id, "production started");
        self.emit(DomainEvent::ProductionStarted {
            request_id: request_id.clone(),
        })
        .await;
        self.must_get(request_id).await
    }

    pub async fn record_quality_check(
        &self,
        request_id: &RequestId,
        shop_id: &PartyId,
        passed: bool,
    ) -> Result<CustomizationRequest> {
        let request = self.must_get(request_id).await?;
        let mut production = self.owned_production(&request, shop_id)?;
        production.record_quality_check(passed)?;
        self.requests
            .update_production(request_id, production)
            .await?;

        info!(request = %request_id, passed, "quality check recorded");
        self.emit(DomainEvent::QualityCheckRecorded {
            request_id: request_id.clone(),
            passed,
        })
        .await;
        self.must_get(request_id).await
    }

    /// Only reachable with a passed quality check; a failed run can never be
    /// recorded as completed.
    pub async fn complete_production(
        &self,
        request_id: &RequestId,
        shop_id: &PartyId,
    ) -> Result<CustomizationRequest> {
        let request = self.must_get(request_id).await?;
        let mut production = self.owned_production(&request, shop_id)?;
        production.complete()?;
        self.requests
            .update_production(request_id, production)
            .await?;
        self.requests
            .update_status(request_id, RequestStatus::Completed)
            .await?;

        info!(request = %request_id, "production completed");
        self.emit(DomainEvent::ProductionCompleted {
            request_id: request_id.clone(),
        })
        .await;
        self.must_get(request_id).await
    }

    /// Processing → Shipped; legal only once production completed. Observing
    /// that transition is what triggers the shop payout attempt.
    pub async fn mark_shipped(&self, order_id: &OrderId) -> Result<Order> {
        let order = self.must_get_order(order_id).await?;
        if order.status != OrderStatus::Processing {
            return Err(EscrowError::invalid_state("mark_shipped", order.status));
        }
        self.ensure_production_completed(&order).await?;

        self.orders
            .update_status(order_id, OrderStatus::Shipped)
            .await?;
        info!(order = %order_id, "order shipped");
        self.emit(DomainEvent::OrderShipped {
            order_id: order_id.clone(),
        })
        .await;

        self.try_release_shop(&order).await;
        self.must_get_order(order_id).await
    }

    pub async fn mark_delivered(&self, order_id: &OrderId) -> Result<Order> {
        let order = self.must_get_order(order_id).await?;
        if order.status != OrderStatus::Shipped {
            return Err(EscrowError::invalid_state("mark_delivered", order.status));
        }

        self.orders
            .update_status(order_id, OrderStatus::Delivered)
            .await?;
        info!(order = %order_id, "order delivered");
        self.emit(DomainEvent::OrderDelivered {
            order_id: order_id.clone(),
        })
        .await;

        self.try_release_shop(&order).await;
        self.must_get_order(order_id).await
    }

    /// Best-effort payout attempt on ship/deliver. A frozen escrow or an
    /// unpaid designer leg just defers it; the release stays idempotent for
    /// whoever retries.
    async fn try_release_shop(&self, order: &Order) {
        let Some(request_id) = &order.request_id else {
            return;
        };
        match self.escrow.release_shop_payment(request_id).await {
            Ok(outcome) => {
                debug!(request = %request_id, net = %outcome.record().net, "shop payout settled")
            }
            Err(EscrowError::EscrowFrozen) => {
                warn!(request = %request_id, "shop payout deferred: escrow frozen")
            }
            Err(EscrowError::InvalidState { current, .. }) => {
                debug!(request = %request_id, %current, "shop payout not yet due")
            }
            Err(error) => warn!(request = %request_id, %error, "shop payout attempt failed"),
        }
    }

    async fn ensure_production_completed(&self, order: &Order) -> Result<()> {
        let Some(request_id) = &order.request_id else {
            return Err(EscrowError::invalid_state("mark_shipped", "no_linked_request"));
        };
        let request = self.must_get(request_id).await?;
        match &request.production {
            Some(production) if production.is_completed() => Ok(()),
            Some(production) => Err(EscrowError::invalid_state(
                "mark_shipped",
                production.status,
            )),
            None => Err(EscrowError::invalid_state("mark_shipped", "no_production")),
        }
    }

    fn owned_production(
        &self,
        request: &CustomizationRequest,
        shop_id: &PartyId,
    ) -> Result<ProductionDetails> {
        let production = request.production.clone().ok_or_else(|| {
            EscrowError::invalid_state("production_update", "no_production")
        })?;
        if &production.shop_id != shop_id {
            return Err(EscrowError::Forbidden(format!(
                "{shop_id} does not own production for {}",
                request.id
            )));
        }
        Ok(production)
    }

    async fn must_get(&self, request_id: &RequestId) -> Result<CustomizationRequest> {
        self.requests
            .get(request_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("customization request", request_id.as_str()))
    }

    async fn must_get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| EscrowError::not_found("order", order_id.as_str()))
    }

    async fn emit(&self, event: DomainEvent) {
        if let Err(error) = self.events.emit(event).await {
            warn!(%error, "event emission failed");
        }
    }
}
