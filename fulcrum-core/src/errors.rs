use crate::models::OrderStatus;
use serde::Serialize;
use uuid::Uuid;

/// Errors surfaced by store and ledger backends. A failed call means no state
/// change happened unless the response said otherwise; callers never retry
/// these inside workflow logic.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Machine-readable reason for a rejected claim, so callers can branch
/// (e.g. route to manual office contact on `not_completed`).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    NotCompleted,
    AlreadyProcessed,
    NoUnknownItems,
}

impl EligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityReason::NotCompleted => "not_completed",
            EligibilityReason::AlreadyProcessed => "already_processed",
            EligibilityReason::NoUnknownItems => "no_unknown_items",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("stale write: order {0} left {1} before this call committed")]
    StaleWrite(Uuid, OrderStatus),

    #[error("order {0} is not ready: last availability check did not confirm all lines")]
    NotReady(Uuid),

    #[error("product {product_id} is not part of order {order_id}")]
    NoSuchLine { order_id: Uuid, product_id: Uuid },

    #[error("payment account already exists for {0}")]
    AlreadyExists(Uuid),

    #[error("no payment account for {0}")]
    NoAccount(Uuid),

    #[error("insufficient funds: balance {balance_cents}, requested {requested_cents}")]
    InsufficientFunds {
        balance_cents: i64,
        requested_cents: i64,
    },

    #[error("claim rejected: {}", .0.as_str())]
    Eligibility(EligibilityReason),

    #[error("line {0} is not eligible for claim-time correction")]
    IneligibleLine(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
