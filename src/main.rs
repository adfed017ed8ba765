use atelier_escrow::application::disputes::DisputeEngine;
use atelier_escrow::application::escrow::EscrowLedger;
use atelier_escrow::application::production::ProductionTracker;
use atelier_escrow::application::reconciler::PaymentReconciler;
use atelier_escrow::domain::ports::{
    DisputeStoreRef, EarningsStoreRef, EventBusRef, OrderStoreRef, RequestStoreRef, StrikeStoreRef,
};
use atelier_escrow::infrastructure::in_memory::{
    InMemoryDisputeStore, InMemoryEarningsStore, InMemoryEventBus, InMemoryGateway,
    InMemoryOrderStore, InMemoryRequestStore, InMemoryStrikeStore,
};
use atelier_escrow::interfaces::csv::event_reader::EventReader;
use atelier_escrow::interfaces::csv::ledger_writer::LedgerWriter;
use atelier_escrow::interfaces::csv::replay::ReplayContext;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input marketplace event log (CSV)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

struct Stores {
    requests: RequestStoreRef,
    orders: OrderStoreRef,
    disputes: DisputeStoreRef,
    strikes: StrikeStoreRef,
    earnings: EarningsStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        requests: Arc::new(InMemoryRequestStore::new()),
        orders: Arc::new(InMemoryOrderStore::new()),
        disputes: Arc::new(InMemoryDisputeStore::new()),
        strikes: Arc::new(InMemoryStrikeStore::new()),
        earnings: Arc::new(InMemoryEarningsStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(path: &PathBuf) -> Result<Stores> {
    use atelier_escrow::infrastructure::rocksdb::RocksDbStore;

    let store = RocksDbStore::open(path).into_diagnostic()?;
    Ok(Stores {
        requests: Arc::new(store.clone()),
        orders: Arc::new(store.clone()),
        disputes: Arc::new(store.clone()),
        strikes: Arc::new(store.clone()),
        earnings: Arc::new(store),
    })
}

/// The replay harness runs against the scriptable in-memory gateway, so an
/// event log can seed invoices and drive verification offline.
fn wire(stores: Stores) -> ReplayContext {
    let gateway = Arc::new(InMemoryGateway::new());
    let events: EventBusRef = Arc::new(InMemoryEventBus::new());

    let escrow = Arc::new(EscrowLedger::new(
        stores.requests.clone(),
        stores.orders.clone(),
        gateway.clone(),
        events.clone(),
    ));
    let dispute_engine = DisputeEngine::new(
        stores.disputes.clone(),
        stores.requests.clone(),
        stores.orders.clone(),
        stores.strikes.clone(),
        escrow.clone(),
        events.clone(),
    );
    let production = ProductionTracker::new(
        stores.requests.clone(),
        stores.orders.clone(),
        escrow.clone(),
        events.clone(),
    );
    let reconciler = PaymentReconciler::new(
        stores.orders.clone(),
        stores.requests.clone(),
        stores.earnings.clone(),
        gateway.clone(),
        escrow.clone(),
        events,
    );

    ReplayContext {
        requests: stores.requests,
        orders: stores.orders,
        disputes: stores.disputes,
        gateway,
        escrow,
        dispute_engine,
        production,
        reconciler,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "storage-rocksdb")]
    let stores = match &cli.db_path {
        Some(path) => rocksdb_stores(path)?,
        None => in_memory_stores(),
    };
    #[cfg(not(feature = "storage-rocksdb"))]
    let stores = in_memory_stores();

    let ctx = wire(stores);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(record) => {
                if let Err(e) = ctx.apply(&record).await {
                    eprintln!("Error applying {} event: {}", record.event, e);
                }
            }
            Err(e) => {
                eprintln!("Error reading event: {}", e);
            }
        }
    }

    let requests = ctx.requests.list().await.into_diagnostic()?;
    let orders = ctx.orders.list().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer.write_requests(&requests).into_diagnostic()?;
    if !orders.is_empty() {
        writer.write_orders(&orders).into_diagnostic()?;
    }

    Ok(())
}
