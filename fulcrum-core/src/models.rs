use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    PendingPayment,
    Processing,
    Collected,
    Problem,
    Completed,
    Cancelled,
    /// Legacy wire literal: "tc"
    #[serde(alias = "tc")]
    Refunded,
    /// Legacy wire literal: "taoshibka"
    #[serde(alias = "taoshibka")]
    RecollectFlagged,
}

impl OrderStatus {
    /// Direct successors in the transition table. Anything not listed here
    /// is an invalid transition, no exceptions.
    pub fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Created => &[PendingPayment],
            PendingPayment => &[Processing],
            Processing => &[Collected, Problem],
            Collected => &[Completed],
            Problem => &[Completed, Cancelled],
            Completed => &[Refunded, RecollectFlagged],
            RecollectFlagged => &[Processing],
            Cancelled | Refunded => &[],
        }
    }

    pub fn can_advance_to(&self, target: OrderStatus) -> bool {
        self.successors().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        use OrderStatus::*;
        match self {
            Created => "CREATED",
            PendingPayment => "PENDING_PAYMENT",
            Processing => "PROCESSING",
            Collected => "COLLECTED",
            Problem => "PROBLEM",
            Completed => "COMPLETED",
            Cancelled => "CANCELLED",
            Refunded => "REFUNDED",
            RecollectFlagged => "RECOLLECT_FLAGGED",
        }
    }

    /// Every status, for exhaustive edge-by-edge transition tests.
    pub fn all() -> &'static [OrderStatus] {
        use OrderStatus::*;
        &[
            Created,
            PendingPayment,
            Processing,
            Collected,
            Problem,
            Completed,
            Cancelled,
            Refunded,
            RecollectFlagged,
        ]
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a single order line as seen by the warehouse.
///
/// `Unknown` means physical presence was never confirmed during collection.
/// `Missing` means a collector actively could not find the line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    Unknown,
    Missing,
}

/// An individual product line within an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub availability: Availability,
}

impl OrderLine {
    pub fn new(product_id: Uuid, product_name: String, quantity: u32, unit_price_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            product_name,
            quantity,
            unit_price_cents,
            availability: Availability::Unknown,
        }
    }

    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// The single source of truth for a client's purchase ("cart").
/// Never deleted, only transitioned to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub warehouse_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
    pub status: OrderStatus,
    /// Collector who completed the collection, once there is one.
    pub collector_id: Option<Uuid>,
    /// Set when a claim requested re-collection; distinguishes
    /// Processing-after-a-claim from first-pass Processing.
    pub recollection_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(client_id: Uuid, warehouse_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            warehouse_id,
            lines: Vec::new(),
            total_cents: 0,
            status: OrderStatus::Created,
            collector_id: None,
            recollection_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_line(&mut self, line: OrderLine) {
        self.total_cents += line.line_total_cents();
        self.lines.push(line);
        self.updated_at = Utc::now();
    }

    pub fn line(&self, line_id: Uuid) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_by_product(&self, product_id: Uuid) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn unknown_lines(&self) -> Vec<&OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.availability == Availability::Unknown)
            .collect()
    }

    pub fn missing_lines(&self) -> Vec<&OrderLine> {
        self.lines
            .iter()
            .filter(|l| l.availability == Availability::Missing)
            .collect()
    }

    /// Total over lines still owed to the client. Missing lines are excluded
    /// once the office approves fulfilling without them; the lines themselves
    /// are kept for the audit trail.
    pub fn billed_total_cents(&self) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.availability != Availability::Missing)
            .map(|l| l.line_total_cents())
            .sum()
    }
}

/// One applied status transition; the log of these is the sole audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemStatus {
    Pending,
    Notified,
    Resolved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProblemDecision {
    ApproveWithoutItem,
    CancelOrder,
    WaitForItem,
}

/// Raised by a collector when a line cannot be found; consumed by the office.
/// At most one active report per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemReport {
    pub id: Uuid,
    pub order_id: Uuid,
    pub collector_id: Uuid,
    pub product_id: Uuid,
    pub detail: String,
    pub status: ProblemStatus,
    pub decision: Option<ProblemDecision>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ProblemReport {
    pub fn new(order_id: Uuid, collector_id: Uuid, product_id: Uuid, detail: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            collector_id,
            product_id,
            detail,
            status: ProblemStatus::Pending,
            decision: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != ProblemStatus::Resolved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
}

/// Per-client payment account. Created at most once per owner; balance is
/// mutated only through settlement. Only the masked card reference is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAccount {
    pub owner_id: Uuid,
    pub balance_cents: i64,
    pub card_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Debit,
    Credit,
}

/// One money movement on a payment account. Debits start unconfirmed and are
/// confirmed by the second settlement step; the gap between the two is the
/// known two-phase exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub order_id: Uuid,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub confirmed: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimAction {
    Refund,
    Recollect,
}

/// A validated post-completion correction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub selected_line_ids: Vec<Uuid>,
    pub action: ClaimAction,
    pub refund_amount_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let line = OrderLine::new(Uuid::new_v4(), "Milk 3.2%".to_string(), 3, 150);
        assert_eq!(line.line_total_cents(), 450);
    }

    #[test]
    fn test_new_lines_start_unknown() {
        let line = OrderLine::new(Uuid::new_v4(), "Rye bread".to_string(), 1, 80);
        assert_eq!(line.availability, Availability::Unknown);
    }

    #[test]
    fn test_billed_total_excludes_missing() {
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4());
        order.add_line(OrderLine::new(Uuid::new_v4(), "A".to_string(), 2, 100));
        let mut missing = OrderLine::new(Uuid::new_v4(), "B".to_string(), 1, 50);
        missing.availability = Availability::Missing;
        order.add_line(missing);

        assert_eq!(order.total_cents, 250);
        assert_eq!(order.billed_total_cents(), 200);
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_legacy_status_aliases_accepted() {
        let refunded: OrderStatus = serde_json::from_str("\"tc\"").unwrap();
        assert_eq!(refunded, OrderStatus::Refunded);
        let flagged: OrderStatus = serde_json::from_str("\"taoshibka\"").unwrap();
        assert_eq!(flagged, OrderStatus::RecollectFlagged);
    }
}
