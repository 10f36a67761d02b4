use fulcrum_core::repository::{OrderStore, Telemetry};
use fulcrum_order::{ClaimResolution, CollectionWorkflow, ExceptionMediator, PaymentSettlement};
use fulcrum_store::app_config::BusinessRules;
use std::sync::Arc;

use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub collection: Arc<CollectionWorkflow>,
    pub settlement: Arc<PaymentSettlement>,
    pub mediator: Arc<ExceptionMediator>,
    pub claims: Arc<ClaimResolution>,
    pub telemetry: Arc<dyn Telemetry>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    pub resiliency: Arc<ResiliencyState>,
}
