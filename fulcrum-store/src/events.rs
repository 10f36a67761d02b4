use async_trait::async_trait;
use fulcrum_core::repository::Telemetry;
use fulcrum_shared::models::events::{
    ClaimResolvedEvent, OrderPaidEvent, ProblemReportedEvent, SettlementEvent, StatusChangedEvent,
};
use std::sync::Mutex;

/// Business event sink: emits structured tracing events and keeps an
/// in-process buffer. The durable transport is outside this system.
pub struct EventRecorder {
    buffer: Mutex<Vec<serde_json::Value>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<serde_json::Value> {
        self.buffer.lock().unwrap().clone()
    }

    fn record(&self, kind: &str, payload: serde_json::Value) {
        tracing::info!(event = kind, %payload, "telemetry event");
        self.buffer
            .lock()
            .unwrap()
            .push(serde_json::json!({ "type": kind, "payload": payload }));
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Telemetry for EventRecorder {
    async fn status_changed(&self, event: StatusChangedEvent) {
        self.record("status_changed", serde_json::to_value(&event).unwrap_or_default());
    }

    async fn order_paid(&self, event: OrderPaidEvent) {
        self.record("order_paid", serde_json::to_value(&event).unwrap_or_default());
    }

    async fn settlement(&self, event: SettlementEvent) {
        self.record("settlement", serde_json::to_value(&event).unwrap_or_default());
    }

    async fn problem_reported(&self, event: ProblemReportedEvent) {
        self.record("problem_reported", serde_json::to_value(&event).unwrap_or_default());
    }

    async fn claim_resolved(&self, event: ClaimResolvedEvent) {
        self.record("claim_resolved", serde_json::to_value(&event).unwrap_or_default());
    }
}
