use crate::domain::dispute::{Dispute, DisputeTarget, Strike};
use crate::domain::ids::{DisputeId, OrderId, PartyId, RequestId};
use crate::domain::order::{DesignerEarning, Order, OrderStatus};
use crate::domain::ports::{
    ClaimOutcome, DisputeStore, EarningsStore, OrderStore, RequestStore, StrikeStore,
};
use crate::domain::production::ProductionDetails;
use crate::domain::request::{
    CustomizationRequest, EscrowStatus, LegKind, PaidRecord, PayoutLeg, PaymentDetails,
    RequestStatus,
};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column family for customization-request documents.
pub const CF_REQUESTS: &str = "requests";
/// Column family for orders.
pub const CF_ORDERS: &str = "orders";
/// Column family for disputes.
pub const CF_DISPUTES: &str = "disputes";
/// Column family for strikes (append-only, keyed party:uuid).
pub const CF_STRIKES: &str = "strikes";
/// Column family for designer earnings.
pub const CF_EARNINGS: &str = "earnings";

/// Persistent store backed by RocksDB, one column family per collection.
///
/// RocksDB has no native compare-and-set, so the conditional primitives
/// (`claim_leg`, `cas_escrow_status`) serialize read-modify-write cycles
/// through a single mutex. `Clone` shares the underlying handle.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates the database, ensuring every column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_REQUESTS, CF_ORDERS, CF_DISPUTES, CF_STRIKES, CF_EARNINGS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| EscrowError::Internal(Box::new(e)))?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EscrowError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: serde::de::DeserializeOwned>(
        &self,
        cf: &'static str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        let Some(bytes) = self
            .db
            .get_cf(cf, key)
            .map_err(|e| EscrowError::Internal(Box::new(e)))?
        else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| EscrowError::Internal(Box::new(e)))?;
        Ok(Some(value))
    }

    fn write<T: serde::Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        let bytes = serde_json::to_vec(value).map_err(|e| EscrowError::Internal(Box::new(e)))?;
        self.db
            .put_cf(cf, key, bytes)
            .map_err(|e| EscrowError::Internal(Box::new(e)))?;
        Ok(())
    }

    fn must_read_request(&self, id: &RequestId) -> Result<CustomizationRequest> {
        self.read(CF_REQUESTS, id.as_str().as_bytes())?
            .ok_or_else(|| EscrowError::not_found("customization request", id.as_str()))
    }
}

#[async_trait]
impl RequestStore for RocksDbStore {
    async fn get(&self, id: &RequestId) -> Result<Option<CustomizationRequest>> {
        self.read(CF_REQUESTS, id.as_str().as_bytes())
    }

    async fn list(&self) -> Result<Vec<CustomizationRequest>> {
        let cf = self.cf(CF_REQUESTS)?;
        let mut requests = Vec::new();
        for entry in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, bytes) = entry.map_err(|e| EscrowError::Internal(Box::new(e)))?;
            let request: CustomizationRequest =
                serde_json::from_slice(&bytes).map_err(|e| EscrowError::Internal(Box::new(e)))?;
            requests.push(request);
        }
        Ok(requests)
    }

    async fn insert(&self, request: CustomizationRequest) -> Result<()> {
        self.write(CF_REQUESTS, request.id.as_str().as_bytes(), &request)
    }

    async fn update_payment(&self, id: &RequestId, payment: PaymentDetails) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        request.payment = payment;
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)
    }

    async fn update_production(&self, id: &RequestId, production: ProductionDetails) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        request.production = Some(production);
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)
    }

    async fn update_status(&self, id: &RequestId, status: RequestStatus) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        request.status = status;
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)
    }

    async fn link_order(&self, id: &RequestId, order_id: &OrderId) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        request.order_id = Some(order_id.clone());
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)
    }

    async fn set_shop(&self, id: &RequestId, shop_id: &PartyId) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        request.printing_shop_id = Some(shop_id.clone());
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)
    }

    async fn claim_leg(
        &self,
        id: &RequestId,
        leg: LegKind,
        record: PaidRecord,
    ) -> Result<ClaimOutcome> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        match request.payment.leg(leg) {
            PayoutLeg::Paid(existing) => Ok(ClaimOutcome::AlreadyPaid(*existing)),
            PayoutLeg::NotPaid => {
                request.payment.record_paid(leg, record);
                self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)?;
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn cas_escrow_status(
        &self,
        id: &RequestId,
        current: EscrowStatus,
        next: EscrowStatus,
    ) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        let mut request = self.must_read_request(id)?;
        if request.payment.escrow_status != current {
            return Ok(false);
        }
        request.payment.escrow_status = next;
        self.write(CF_REQUESTS, id.as_str().as_bytes(), &request)?;
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, id.as_str().as_bytes())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for entry in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, bytes) = entry.map_err(|e| EscrowError::Internal(Box::new(e)))?;
            let order: Order =
                serde_json::from_slice(&bytes).map_err(|e| EscrowError::Internal(Box::new(e)))?;
            orders.push(order);
        }
        Ok(orders)
    }

    async fn get_by_external(&self, external_id: &str) -> Result<Option<Order>> {
        self.read(CF_ORDERS, external_id.as_bytes())
    }

    async fn insert(&self, order: Order) -> Result<()> {
        self.write(CF_ORDERS, order.id.as_str().as_bytes(), &order)
    }

    async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut order: Order = self
            .read(CF_ORDERS, id.as_str().as_bytes())?
            .ok_or_else(|| EscrowError::not_found("order", id.as_str()))?;
        order.status = status;
        match status {
            OrderStatus::Shipped => order.shipped_at = Some(chrono::Utc::now()),
            OrderStatus::Delivered => order.delivered_at = Some(chrono::Utc::now()),
            _ => {}
        }
        self.write(CF_ORDERS, id.as_str().as_bytes(), &order)
    }

    async fn record_payment(&self, id: &OrderId, paid_amount: Decimal) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut order: Order = self
            .read(CF_ORDERS, id.as_str().as_bytes())?
            .ok_or_else(|| EscrowError::not_found("order", id.as_str()))?;
        order.paid_amount = order.paid_amount.max(paid_amount);
        order.payment_status = if order.paid_amount >= order.total_amount.value() {
            crate::domain::request::PaymentStatus::FullyPaid
        } else if order.paid_amount > Decimal::ZERO {
            crate::domain::request::PaymentStatus::PartiallyPaid
        } else {
            crate::domain::request::PaymentStatus::Pending
        };
        self.write(CF_ORDERS, id.as_str().as_bytes(), &order)
    }
}

#[async_trait]
impl DisputeStore for RocksDbStore {
    async fn get(&self, id: &DisputeId) -> Result<Option<Dispute>> {
        self.read(CF_DISPUTES, id.to_string().as_bytes())
    }

    async fn insert(&self, dispute: Dispute) -> Result<()> {
        self.write(CF_DISPUTES, dispute.id.to_string().as_bytes(), &dispute)
    }

    async fn update(&self, dispute: Dispute) -> Result<()> {
        self.write(CF_DISPUTES, dispute.id.to_string().as_bytes(), &dispute)
    }

    async fn open_for_target(&self, target: &DisputeTarget) -> Result<Option<Dispute>> {
        let cf = self.cf(CF_DISPUTES)?;
        for entry in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, bytes) = entry.map_err(|e| EscrowError::Internal(Box::new(e)))?;
            let dispute: Dispute =
                serde_json::from_slice(&bytes).map_err(|e| EscrowError::Internal(Box::new(e)))?;
            if dispute.is_open() && &dispute.target == target {
                return Ok(Some(dispute));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl StrikeStore for RocksDbStore {
    async fn append(&self, strike: Strike) -> Result<()> {
        let key = format!("{}:{}", strike.party_id, strike.id);
        self.write(CF_STRIKES, key.as_bytes(), &strike)
    }

    async fn for_party(&self, party_id: &PartyId) -> Result<Vec<Strike>> {
        let cf = self.cf(CF_STRIKES)?;
        let prefix = format!("{party_id}:");
        let mut strikes = Vec::new();
        for entry in self
            .db
            .prefix_iterator_cf(cf, prefix.as_bytes())
        {
            let (key, bytes) = entry.map_err(|e| EscrowError::Internal(Box::new(e)))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let strike: Strike =
                serde_json::from_slice(&bytes).map_err(|e| EscrowError::Internal(Box::new(e)))?;
            strikes.push(strike);
        }
        Ok(strikes)
    }
}

#[async_trait]
impl EarningsStore for RocksDbStore {
    async fn for_order(&self, order_id: &OrderId) -> Result<Option<DesignerEarning>> {
        self.read(CF_EARNINGS, order_id.as_str().as_bytes())
    }

    async fn record(&self, earning: DesignerEarning) -> Result<()> {
        self.write(CF_EARNINGS, earning.order_id.as_str().as_bytes(), &earning)
    }
}
