use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct StatusChangedEvent {
    pub order_id: Uuid,
    pub from: String,
    pub to: String,
    pub actor: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub total_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SettlementEvent {
    pub order_id: Uuid,
    pub amount_cents: i64,
    pub event_type: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ProblemReportedEvent {
    pub order_id: Uuid,
    pub collector_id: Uuid,
    pub product_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ClaimResolvedEvent {
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub action: String,
    pub refund_cents: i64,
    pub timestamp: i64,
}
