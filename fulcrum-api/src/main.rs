use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fulcrum_api::middleware::resiliency::CircuitBreaker;
use fulcrum_api::state::{AppState, AuthConfig, ResiliencyState};
use fulcrum_core::{LedgerStore, Notifier, OrderStore, StockRepository};
use fulcrum_order::{
    ClaimResolution, CollectionWorkflow, ExceptionMediator, FirstMatchSelector, PaymentSettlement,
};
use fulcrum_store::{
    EventRecorder, MemoryLedgerStore, MemoryNotifier, MemoryOrderStore, MemoryStockRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fulcrum_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fulcrum_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Fulcrum API on port {}", config.server.port);

    // Backing stores. The order store and payment ledger live in external
    // systems in production; the in-process implementations stand in for
    // them behind the same traits.
    let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
    let stock: Arc<dyn StockRepository> = Arc::new(MemoryStockRepository::new());
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
    let notifier: Arc<dyn Notifier> = Arc::new(MemoryNotifier::new());
    let telemetry = Arc::new(EventRecorder::new());

    let settlement = Arc::new(PaymentSettlement::new(
        ledger.clone(),
        orders.clone(),
        stock.clone(),
    ));
    let collection = Arc::new(CollectionWorkflow::new(orders.clone(), stock.clone()));
    let selector = Arc::new(FirstMatchSelector::new(stock.clone()));
    let mediator = Arc::new(ExceptionMediator::new(
        orders.clone(),
        notifier,
        settlement.clone(),
        selector,
        config.business_rules.refund_on_cancel,
    ));
    let claims = Arc::new(ClaimResolution::new(orders.clone(), settlement.clone()));

    let app_state = AppState {
        orders,
        collection,
        settlement,
        mediator,
        claims,
        telemetry,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
        resiliency: Arc::new(ResiliencyState {
            payment_cb: CircuitBreaker::new("payment-ledger", 5, Duration::from_secs(30)),
        }),
    };

    let app = fulcrum_api::app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
