use crate::state::OrderStateMachine;
use chrono::{Duration, Utc};
use fulcrum_core::{
    LedgerEntry, LedgerEntryType, LedgerStore, Order, OrderLine, OrderStatus, OrderStore,
    PaymentAccount, SessionContext, StockRepository, WorkflowError,
};
use fulcrum_shared::pii::mask_card;
use std::sync::Arc;
use uuid::Uuid;

/// Two-step settlement protocol: debit the client's account, then confirm.
/// The confirm is what deducts reserved stock and moves the order to
/// `Processing`. The two steps are sequential and deliberately NOT atomic:
/// a confirm failure after a successful withdraw leaves the client charged
/// with nothing collected. That gap is surfaced through
/// `stale_withdrawals`, never papered over here.
pub struct PaymentSettlement {
    ledger: Arc<dyn LedgerStore>,
    store: Arc<dyn OrderStore>,
    stock: Arc<dyn StockRepository>,
    state: OrderStateMachine,
}

impl PaymentSettlement {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        store: Arc<dyn OrderStore>,
        stock: Arc<dyn StockRepository>,
    ) -> Self {
        let state = OrderStateMachine::new(store.clone());
        Self {
            ledger,
            store,
            stock,
            state,
        }
    }

    /// Creates exactly one payment account per owner. Only the masked card
    /// reference is kept.
    pub async fn provision_account(
        &self,
        _ctx: &SessionContext,
        user_id: Uuid,
        card_number: &str,
    ) -> Result<PaymentAccount, WorkflowError> {
        if card_number.chars().filter(|c| c.is_ascii_digit()).count() < 12 {
            return Err(WorkflowError::Validation(
                "card number must contain at least 12 digits".to_string(),
            ));
        }

        let account = PaymentAccount {
            owner_id: user_id,
            balance_cents: 0,
            card_ref: mask_card(card_number),
            created_at: Utc::now(),
        };

        let created = self.ledger.insert_account(&account).await?;
        if !created {
            return Err(WorkflowError::AlreadyExists(user_id));
        }

        tracing::info!(owner_id = %user_id, "payment account provisioned");
        Ok(account)
    }

    /// Lock-in before payment: the order leaves `Created` so its contents
    /// stop being editable while the client pays.
    pub async fn begin_checkout(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
    ) -> Result<(), WorkflowError> {
        self.state
            .advance_from(ctx, order_id, OrderStatus::Created, OrderStatus::PendingPayment)
            .await
    }

    /// Step one: debit the balance and record an unconfirmed ledger entry.
    /// Returns the new balance. Moves neither order status nor stock.
    pub async fn withdraw(
        &self,
        _ctx: &SessionContext,
        user_id: Uuid,
        amount_cents: i64,
        order_id: Uuid,
        description: Option<String>,
    ) -> Result<i64, WorkflowError> {
        if amount_cents <= 0 {
            return Err(WorkflowError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        let account = self
            .ledger
            .get_account(user_id)
            .await?
            .ok_or(WorkflowError::NoAccount(user_id))?;
        if account.balance_cents < amount_cents {
            return Err(WorkflowError::InsufficientFunds {
                balance_cents: account.balance_cents,
                requested_cents: amount_cents,
            });
        }

        let new_balance = self.ledger.adjust_balance(user_id, -amount_cents).await?;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            owner_id: user_id,
            order_id,
            entry_type: LedgerEntryType::Debit,
            amount_cents,
            confirmed: false,
            description,
            created_at: Utc::now(),
        };
        self.ledger.append_entry(&entry).await?;

        tracing::info!(
            owner_id = %user_id,
            order_id = %order_id,
            amount_cents,
            new_balance,
            "withdrawal debited (unconfirmed)"
        );

        Ok(new_balance)
    }

    /// Step two: deduct reserved stock line by line, confirm the debit and
    /// move the order `PendingPayment -> Processing`. A failed confirm
    /// unwinds its own stock deductions, but never the phase-one debit: the
    /// client stays charged and the order stays in `PendingPayment`, visible
    /// via `stale_withdrawals`.
    pub async fn confirm_payment(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        amount_cents: i64,
    ) -> Result<Order, WorkflowError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::PendingPayment {
            return Err(WorkflowError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Processing,
            });
        }
        if amount_cents != order.total_cents {
            return Err(WorkflowError::Validation(format!(
                "confirmation amount {} does not match order total {}",
                amount_cents, order.total_cents
            )));
        }

        // A confirm that never had a withdraw must fail before any state
        // changes hands.
        let has_pending_debit = self
            .ledger
            .unconfirmed_entries()
            .await?
            .iter()
            .any(|e| e.order_id == order_id && e.entry_type == LedgerEntryType::Debit);
        if !has_pending_debit {
            return Err(WorkflowError::Validation(format!(
                "no unconfirmed withdrawal to settle for order {}",
                order_id
            )));
        }

        // The deduction is all-or-nothing: a shortfall on a later line
        // returns what the earlier lines already took.
        let mut deducted: Vec<&OrderLine> = Vec::new();
        for line in &order.lines {
            if let Err(err) = self
                .stock
                .deduct(order.warehouse_id, line.product_id, line.quantity)
                .await
            {
                for taken in deducted {
                    self.stock
                        .restock(order.warehouse_id, taken.product_id, taken.quantity)
                        .await?;
                }
                return Err(err.into());
            }
            deducted.push(line);
        }

        if let Err(err) = self
            .state
            .advance_from(ctx, order_id, OrderStatus::PendingPayment, OrderStatus::Processing)
            .await
        {
            for line in &order.lines {
                self.stock
                    .restock(order.warehouse_id, line.product_id, line.quantity)
                    .await?;
            }
            return Err(err);
        }

        // Verified above and we hold the CAS, so this cannot come back false.
        self.ledger.confirm_entry(order_id).await?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        tracing::info!(order_id = %order_id, amount_cents, "payment confirmed, order released to collection");
        Ok(order)
    }

    /// Whether the owner has a payment account. Callers that move order
    /// status before crediting use this to fail first.
    pub async fn account_exists(&self, user_id: Uuid) -> Result<bool, WorkflowError> {
        Ok(self.ledger.get_account(user_id).await?.is_some())
    }

    /// Refund leg: credit the owner and record a confirmed credit entry.
    /// Returns the new balance.
    pub async fn credit(
        &self,
        _ctx: &SessionContext,
        user_id: Uuid,
        amount_cents: i64,
        order_id: Uuid,
        description: Option<String>,
    ) -> Result<i64, WorkflowError> {
        if amount_cents <= 0 {
            return Err(WorkflowError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }

        if self.ledger.get_account(user_id).await?.is_none() {
            return Err(WorkflowError::NoAccount(user_id));
        }

        let new_balance = self.ledger.adjust_balance(user_id, amount_cents).await?;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            owner_id: user_id,
            order_id,
            entry_type: LedgerEntryType::Credit,
            amount_cents,
            confirmed: true,
            description,
            created_at: Utc::now(),
        };
        self.ledger.append_entry(&entry).await?;

        tracing::info!(owner_id = %user_id, order_id = %order_id, amount_cents, new_balance, "account credited");
        Ok(new_balance)
    }

    /// Debits whose confirm never arrived within the deadline. These are the
    /// charged-but-never-settled cases; resolution is manual.
    pub async fn stale_withdrawals(
        &self,
        older_than: Duration,
    ) -> Result<Vec<LedgerEntry>, WorkflowError> {
        let cutoff = Utc::now() - older_than;
        let entries = self.ledger.unconfirmed_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.entry_type == LedgerEntryType::Debit && e.created_at < cutoff)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_core::{OrderLine, Role};
    use fulcrum_store::memory::{MemoryLedgerStore, MemoryOrderStore, MemoryStockRepository};

    struct Fixture {
        ledger: Arc<MemoryLedgerStore>,
        store: Arc<MemoryOrderStore>,
        stock: Arc<MemoryStockRepository>,
        settlement: PaymentSettlement,
        warehouse_id: Uuid,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(MemoryLedgerStore::new());
        let store = Arc::new(MemoryOrderStore::new());
        let stock = Arc::new(MemoryStockRepository::new());
        let warehouse_id = stock.add_warehouse("Main");
        let settlement = PaymentSettlement::new(ledger.clone(), store.clone(), stock.clone());
        Fixture {
            ledger,
            store,
            stock,
            settlement,
            warehouse_id,
        }
    }

    fn client() -> SessionContext {
        SessionContext::new(Uuid::new_v4(), Role::Client)
    }

    async fn seed_pending_order(fx: &Fixture, client_id: Uuid, qty: u32, price: i64) -> Order {
        let mut order = Order::new(client_id, fx.warehouse_id);
        let product_id = Uuid::new_v4();
        fx.stock.set_quantity(fx.warehouse_id, product_id, qty + 5);
        order.add_line(OrderLine::new(product_id, "Coffee beans".to_string(), qty, price));
        order.status = OrderStatus::PendingPayment;
        fx.store.insert_order(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_provision_account_once() {
        let fx = fixture();
        let ctx = client();
        let account = fx
            .settlement
            .provision_account(&ctx, ctx.user_id, "4276 5500 1234 5678")
            .await
            .unwrap();
        assert_eq!(account.card_ref, "**** **** **** 5678");

        let retry = fx
            .settlement
            .provision_account(&ctx, ctx.user_id, "4276 5500 1234 5678")
            .await;
        assert!(matches!(retry, Err(WorkflowError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 100);

        let result = fx
            .settlement
            .withdraw(&ctx, ctx.user_id, 300, Uuid::new_v4(), None)
            .await;
        assert!(matches!(result, Err(WorkflowError::InsufficientFunds { .. })));
        assert_eq!(fx.ledger.balance(ctx.user_id), Some(100));
    }

    #[tokio::test]
    async fn test_withdraw_alone_moves_nothing_but_money() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 500);
        let order = seed_pending_order(&fx, ctx.user_id, 2, 150).await;

        let balance = fx
            .settlement
            .withdraw(&ctx, ctx.user_id, 300, order.id, None)
            .await
            .unwrap();
        assert_eq!(balance, 200);

        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
        let product_id = order.lines[0].product_id;
        // Stock untouched until confirm.
        assert_eq!(
            fx.stock
                .available_quantity(fx.warehouse_id, product_id)
                .await
                .unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn test_full_two_step_settlement() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 1000);
        let order = seed_pending_order(&fx, ctx.user_id, 2, 150).await;

        fx.settlement
            .withdraw(&ctx, ctx.user_id, order.total_cents, order.id, None)
            .await
            .unwrap();
        let settled = fx
            .settlement
            .confirm_payment(&ctx, order.id, order.total_cents)
            .await
            .unwrap();

        assert_eq!(settled.status, OrderStatus::Processing);
        let product_id = order.lines[0].product_id;
        assert_eq!(
            fx.stock
                .available_quantity(fx.warehouse_id, product_id)
                .await
                .unwrap(),
            5
        );
        assert!(fx.ledger.unconfirmed_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_failure_leaves_debit_and_status() {
        // Scenario from the settlement defect list: withdraw succeeds
        // (500 -> 200), confirm throws, and nothing reconciles the gap.
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 500);

        let mut order = Order::new(ctx.user_id, fx.warehouse_id);
        // No stock seeded for this product, so the deduct in confirm fails.
        order.add_line(OrderLine::new(Uuid::new_v4(), "Caviar".to_string(), 1, 300));
        order.status = OrderStatus::PendingPayment;
        fx.store.insert_order(&order).await.unwrap();

        let balance = fx
            .settlement
            .withdraw(&ctx, ctx.user_id, 300, order.id, None)
            .await
            .unwrap();
        assert_eq!(balance, 200);

        let result = fx.settlement.confirm_payment(&ctx, order.id, 300).await;
        assert!(result.is_err());

        // Charged, not settled, order still pending payment.
        assert_eq!(fx.ledger.balance(ctx.user_id), Some(200));
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);

        // The gap is visible to operators once the deadline passes.
        let stale = fx
            .settlement
            .stale_withdrawals(Duration::seconds(-1))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].order_id, order.id);
    }

    #[tokio::test]
    async fn test_confirm_without_withdraw_leaves_stock_untouched() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 500);
        let order = seed_pending_order(&fx, ctx.user_id, 2, 150).await;
        let product_id = order.lines[0].product_id;

        // No withdraw happened; the confirm is out of sequence.
        let result = fx
            .settlement
            .confirm_payment(&ctx, order.id, order.total_cents)
            .await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        assert_eq!(
            fx.stock
                .available_quantity(fx.warehouse_id, product_id)
                .await
                .unwrap(),
            7
        );
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_failed_confirm_restocks_earlier_lines() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 1000);

        let covered = Uuid::new_v4();
        let short = Uuid::new_v4();
        fx.stock.set_quantity(fx.warehouse_id, covered, 5);
        // Second line has no stock at all, so its deduct fails.
        let mut order = Order::new(ctx.user_id, fx.warehouse_id);
        order.add_line(OrderLine::new(covered, "Tea".to_string(), 2, 100));
        order.add_line(OrderLine::new(short, "Honey".to_string(), 1, 200));
        order.status = OrderStatus::PendingPayment;
        fx.store.insert_order(&order).await.unwrap();

        fx.settlement
            .withdraw(&ctx, ctx.user_id, 400, order.id, None)
            .await
            .unwrap();
        let result = fx.settlement.confirm_payment(&ctx, order.id, 400).await;
        assert!(result.is_err());

        // The first line's deduction was returned to the shelf.
        assert_eq!(
            fx.stock
                .available_quantity(fx.warehouse_id, covered)
                .await
                .unwrap(),
            5
        );
        // Debit stays unconfirmed and the order stays pending.
        assert_eq!(fx.ledger.unconfirmed_entries().await.unwrap().len(), 1);
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_confirm_amount_must_match_total() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 1000);
        let order = seed_pending_order(&fx, ctx.user_id, 1, 250).await;

        fx.settlement
            .withdraw(&ctx, ctx.user_id, 250, order.id, None)
            .await
            .unwrap();
        let result = fx.settlement.confirm_payment(&ctx, order.id, 100).await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_credit_restores_balance() {
        let fx = fixture();
        let ctx = client();
        fx.ledger.seed_account(ctx.user_id, 100);

        let balance = fx
            .settlement
            .credit(&ctx, ctx.user_id, 250, Uuid::new_v4(), Some("claim refund".to_string()))
            .await
            .unwrap();
        assert_eq!(balance, 350);
    }

    #[tokio::test]
    async fn test_begin_checkout_locks_order() {
        let fx = fixture();
        let ctx = client();
        let mut order = Order::new(ctx.user_id, fx.warehouse_id);
        order.status = OrderStatus::Created;
        fx.store.insert_order(&order).await.unwrap();

        fx.settlement.begin_checkout(&ctx, order.id).await.unwrap();
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
    }
}
