use crate::errors::StoreError;
use crate::models::{
    LedgerEntry, Order, OrderLine, OrderStatus, PaymentAccount, ProblemReport, ProblemStatus,
    TransitionRecord, Warehouse,
};
use async_trait::async_trait;
use fulcrum_shared::models::events::{
    ClaimResolvedEvent, OrderPaidEvent, ProblemReportedEvent, SettlementEvent, StatusChangedEvent,
};
use fulcrum_shared::pii::Masked;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, StoreError>;

/// Order record store, external to the core. Holds orders, their lines, the
/// transition log and problem reports.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> RepoResult<Uuid>;

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;

    async fn list_by_status(&self, status: OrderStatus) -> RepoResult<Vec<Order>>;

    async fn list_by_client(&self, client_id: Uuid) -> RepoResult<Vec<Order>>;

    /// Conditional status update: applies `next` only while the stored status
    /// still equals `expected`. Returns false when a concurrent writer got
    /// there first. This is the single mutation primitive for status.
    async fn update_status_if(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<bool>;

    async fn update_lines(&self, id: Uuid, lines: &[OrderLine]) -> RepoResult<()>;

    async fn set_collector(&self, id: Uuid, collector_id: Uuid) -> RepoResult<()>;

    async fn set_warehouse(&self, id: Uuid, warehouse_id: Uuid) -> RepoResult<()>;

    async fn set_total(&self, id: Uuid, total_cents: i64) -> RepoResult<()>;

    async fn set_recollection_requested(&self, id: Uuid, requested: bool) -> RepoResult<()>;

    /// Append-only; there is no way to remove or rewrite a record.
    async fn append_transition(&self, record: &TransitionRecord) -> RepoResult<()>;

    async fn transitions(&self, order_id: Uuid) -> RepoResult<Vec<TransitionRecord>>;

    async fn insert_problem(&self, report: &ProblemReport) -> RepoResult<()>;

    /// The one active (non-resolved) report for an order, if any.
    async fn active_problem(&self, order_id: Uuid) -> RepoResult<Option<ProblemReport>>;

    async fn list_problems(&self, status: Option<ProblemStatus>) -> RepoResult<Vec<ProblemReport>>;

    async fn update_problem(&self, report: &ProblemReport) -> RepoResult<()>;
}

/// Warehouse stock, external. Quantities are per warehouse per product.
#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn available_quantity(&self, warehouse_id: Uuid, product_id: Uuid) -> RepoResult<u32>;

    async fn deduct(&self, warehouse_id: Uuid, product_id: Uuid, quantity: u32) -> RepoResult<()>;

    /// Returns quantity to the shelf; used to unwind a partially applied
    /// multi-line deduction.
    async fn restock(&self, warehouse_id: Uuid, product_id: Uuid, quantity: u32) -> RepoResult<()>;

    async fn list_warehouses(&self) -> RepoResult<Vec<Warehouse>>;
}

/// Per-user balance ledger, external. Balance never goes negative; a debit
/// that would cross zero is a Conflict.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns false if an account for this owner already exists.
    async fn insert_account(&self, account: &PaymentAccount) -> RepoResult<bool>;

    async fn get_account(&self, owner_id: Uuid) -> RepoResult<Option<PaymentAccount>>;

    /// Applies `delta_cents` (negative = debit) and returns the new balance.
    async fn adjust_balance(&self, owner_id: Uuid, delta_cents: i64) -> RepoResult<i64>;

    async fn append_entry(&self, entry: &LedgerEntry) -> RepoResult<()>;

    /// Marks the unconfirmed debit for this order as confirmed. Returns false
    /// if there is nothing to confirm.
    async fn confirm_entry(&self, order_id: Uuid) -> RepoResult<bool>;

    async fn unconfirmed_entries(&self) -> RepoResult<Vec<LedgerEntry>>;
}

/// Outbound client messaging (email-shaped in the source).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to: &Masked<String>,
        recipient_name: &str,
        subject: &str,
        body: &str,
    ) -> RepoResult<()>;
}

/// Business event sink. The transport is external; implementations decide
/// where the events land.
#[async_trait]
pub trait Telemetry: Send + Sync {
    async fn status_changed(&self, event: StatusChangedEvent);
    async fn order_paid(&self, event: OrderPaidEvent);
    async fn settlement(&self, event: SettlementEvent);
    async fn problem_reported(&self, event: ProblemReportedEvent);
    async fn claim_resolved(&self, event: ClaimResolvedEvent);
}
