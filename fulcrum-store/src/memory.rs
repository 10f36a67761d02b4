//! In-memory reference implementations of the external collaborators. The
//! production order store and payment ledger live outside this system; these
//! back the API in development and the workflow tests.

use async_trait::async_trait;
use chrono::Utc;
use fulcrum_core::errors::StoreError;
use fulcrum_core::repository::{
    LedgerStore, Notifier, OrderStore, RepoResult, StockRepository,
};
use fulcrum_core::{
    LedgerEntry, Order, OrderLine, OrderStatus, PaymentAccount, ProblemReport, ProblemStatus,
    TransitionRecord, Warehouse,
};
use fulcrum_shared::pii::Masked;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    transitions: Mutex<Vec<TransitionRecord>>,
    problems: Mutex<Vec<ProblemReport>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            transitions: Mutex::new(Vec::new()),
            problems: Mutex::new(Vec::new()),
        }
    }

    fn with_order<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Order) -> T,
    ) -> RepoResult<T> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;
        let out = f(order);
        order.updated_at = Utc::now();
        Ok(out)
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> RepoResult<Uuid> {
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_status(&self, status: OrderStatus) -> RepoResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_by_client(&self, client_id: Uuid) -> RepoResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.client_id == client_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<bool> {
        self.with_order(id, |order| {
            if order.status != expected {
                return false;
            }
            order.status = next;
            true
        })
    }

    async fn update_lines(&self, id: Uuid, lines: &[OrderLine]) -> RepoResult<()> {
        self.with_order(id, |order| {
            order.lines = lines.to_vec();
        })
    }

    async fn set_collector(&self, id: Uuid, collector_id: Uuid) -> RepoResult<()> {
        self.with_order(id, |order| {
            order.collector_id = Some(collector_id);
        })
    }

    async fn set_warehouse(&self, id: Uuid, warehouse_id: Uuid) -> RepoResult<()> {
        self.with_order(id, |order| {
            order.warehouse_id = warehouse_id;
        })
    }

    async fn set_total(&self, id: Uuid, total_cents: i64) -> RepoResult<()> {
        self.with_order(id, |order| {
            order.total_cents = total_cents;
        })
    }

    async fn set_recollection_requested(&self, id: Uuid, requested: bool) -> RepoResult<()> {
        self.with_order(id, |order| {
            order.recollection_requested = requested;
        })
    }

    async fn append_transition(&self, record: &TransitionRecord) -> RepoResult<()> {
        self.transitions.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn transitions(&self, order_id: Uuid) -> RepoResult<Vec<TransitionRecord>> {
        Ok(self
            .transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_problem(&self, report: &ProblemReport) -> RepoResult<()> {
        let mut problems = self.problems.lock().unwrap();
        if problems
            .iter()
            .any(|p| p.order_id == report.order_id && p.is_active())
        {
            return Err(StoreError::Conflict(format!(
                "order {} already has an active problem report",
                report.order_id
            )));
        }
        problems.push(report.clone());
        Ok(())
    }

    async fn active_problem(&self, order_id: Uuid) -> RepoResult<Option<ProblemReport>> {
        Ok(self
            .problems
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.order_id == order_id && p.is_active())
            .cloned())
    }

    async fn list_problems(
        &self,
        status: Option<ProblemStatus>,
    ) -> RepoResult<Vec<ProblemReport>> {
        let problems = self.problems.lock().unwrap();
        Ok(problems
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn update_problem(&self, report: &ProblemReport) -> RepoResult<()> {
        let mut problems = self.problems.lock().unwrap();
        let slot = problems
            .iter_mut()
            .find(|p| p.id == report.id)
            .ok_or_else(|| StoreError::NotFound(format!("problem report {}", report.id)))?;
        *slot = report.clone();
        Ok(())
    }
}

pub struct MemoryStockRepository {
    warehouses: Mutex<Vec<Warehouse>>,
    // (warehouse, product) -> on-hand quantity
    stock: Mutex<HashMap<(Uuid, Uuid), u32>>,
}

impl MemoryStockRepository {
    pub fn new() -> Self {
        Self {
            warehouses: Mutex::new(Vec::new()),
            stock: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_warehouse(&self, name: &str) -> Uuid {
        let warehouse = Warehouse {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        let id = warehouse.id;
        self.warehouses.lock().unwrap().push(warehouse);
        id
    }

    pub fn set_quantity(&self, warehouse_id: Uuid, product_id: Uuid, quantity: u32) {
        self.stock
            .lock()
            .unwrap()
            .insert((warehouse_id, product_id), quantity);
    }
}

impl Default for MemoryStockRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockRepository for MemoryStockRepository {
    async fn available_quantity(&self, warehouse_id: Uuid, product_id: Uuid) -> RepoResult<u32> {
        Ok(*self
            .stock
            .lock()
            .unwrap()
            .get(&(warehouse_id, product_id))
            .unwrap_or(&0))
    }

    async fn deduct(&self, warehouse_id: Uuid, product_id: Uuid, quantity: u32) -> RepoResult<()> {
        let mut stock = self.stock.lock().unwrap();
        let on_hand = stock.entry((warehouse_id, product_id)).or_insert(0);
        if *on_hand < quantity {
            return Err(StoreError::Conflict(format!(
                "insufficient stock for product {}: have {}, need {}",
                product_id, on_hand, quantity
            )));
        }
        *on_hand -= quantity;
        Ok(())
    }

    async fn restock(&self, warehouse_id: Uuid, product_id: Uuid, quantity: u32) -> RepoResult<()> {
        let mut stock = self.stock.lock().unwrap();
        *stock.entry((warehouse_id, product_id)).or_insert(0) += quantity;
        Ok(())
    }

    async fn list_warehouses(&self) -> RepoResult<Vec<Warehouse>> {
        Ok(self.warehouses.lock().unwrap().clone())
    }
}

pub struct MemoryLedgerStore {
    accounts: Mutex<HashMap<Uuid, PaymentAccount>>,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Test helper: create an account with a starting balance.
    pub fn seed_account(&self, owner_id: Uuid, balance_cents: i64) {
        self.accounts.lock().unwrap().insert(
            owner_id,
            PaymentAccount {
                owner_id,
                balance_cents,
                card_ref: "**** **** **** 0000".to_string(),
                created_at: Utc::now(),
            },
        );
    }

    pub fn balance(&self, owner_id: Uuid) -> Option<i64> {
        self.accounts
            .lock()
            .unwrap()
            .get(&owner_id)
            .map(|a| a.balance_cents)
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_account(&self, account: &PaymentAccount) -> RepoResult<bool> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&account.owner_id) {
            return Ok(false);
        }
        accounts.insert(account.owner_id, account.clone());
        Ok(true)
    }

    async fn get_account(&self, owner_id: Uuid) -> RepoResult<Option<PaymentAccount>> {
        Ok(self.accounts.lock().unwrap().get(&owner_id).cloned())
    }

    async fn adjust_balance(&self, owner_id: Uuid, delta_cents: i64) -> RepoResult<i64> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&owner_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", owner_id)))?;
        let new_balance = account.balance_cents + delta_cents;
        if new_balance < 0 {
            return Err(StoreError::Conflict(format!(
                "balance for {} would go negative",
                owner_id
            )));
        }
        account.balance_cents = new_balance;
        Ok(new_balance)
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> RepoResult<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn confirm_entry(&self, order_id: Uuid) -> RepoResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        match entries
            .iter_mut()
            .find(|e| e.order_id == order_id && !e.confirmed)
        {
            Some(entry) => {
                entry.confirmed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unconfirmed_entries(&self) -> RepoResult<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.confirmed)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient_name: String,
    pub subject: String,
    pub body: String,
}

/// Captures outbound messages instead of sending them. The real transport is
/// an external mail service.
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(
        &self,
        to: &Masked<String>,
        recipient_name: &str,
        subject: &str,
        body: &str,
    ) -> RepoResult<()> {
        // The address goes through masked so it cannot end up in logs.
        tracing::info!(recipient = %to, subject, "notification sent");
        self.sent.lock().unwrap().push(SentMessage {
            recipient_name: recipient_name.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
