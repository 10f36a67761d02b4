use crate::settlement::PaymentSettlement;
use crate::state::OrderStateMachine;
use fulcrum_core::{
    Availability, ClaimAction, ClaimRequest, EligibilityReason, Order, OrderStatus, OrderStore,
    SessionContext, WorkflowError,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// An `Unknown` line of a completed order, as shown to the client when
/// starting a claim.
#[derive(Debug, Clone, Serialize)]
pub struct UnderdeliveredLine {
    pub cart_id: Uuid,
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub availability: Availability,
}

/// Post-completion client-initiated correction: eligibility gating, selection
/// of under-delivered (`Unknown`) lines, then refund or re-collection.
/// `Missing` lines were handled in-flight by the office and `Available` lines
/// were fulfilled; neither is ever correctable here.
pub struct ClaimResolution {
    store: Arc<dyn OrderStore>,
    settlement: Arc<PaymentSettlement>,
    state: OrderStateMachine,
}

impl ClaimResolution {
    pub fn new(store: Arc<dyn OrderStore>, settlement: Arc<PaymentSettlement>) -> Self {
        let state = OrderStateMachine::new(store.clone());
        Self {
            store,
            settlement,
            state,
        }
    }

    /// Unknown lines across the caller's completed orders.
    pub async fn list_underdelivered(
        &self,
        ctx: &SessionContext,
    ) -> Result<Vec<UnderdeliveredLine>, WorkflowError> {
        let orders = self.store.list_by_client(ctx.user_id).await?;
        let mut result = Vec::new();
        for order in orders {
            if order.status != OrderStatus::Completed {
                continue;
            }
            for line in order.unknown_lines() {
                result.push(UnderdeliveredLine {
                    cart_id: order.id,
                    line_id: line.id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    availability: line.availability,
                });
            }
        }
        Ok(result)
    }

    /// The four-step gate from the claims wizard. Claim-branch statuses are
    /// checked before the plain completed check so a second claim reads as
    /// `already_processed`, not `not_completed`.
    pub fn check_eligibility(order: &Order, client_id: Uuid) -> Result<(), WorkflowError> {
        if order.client_id != client_id {
            return Err(WorkflowError::Validation(format!(
                "order {} does not belong to the requesting client",
                order.id
            )));
        }

        let in_claim_branch = matches!(
            order.status,
            OrderStatus::Refunded | OrderStatus::RecollectFlagged
        ) || (order.status == OrderStatus::Processing && order.recollection_requested);
        if in_claim_branch {
            return Err(WorkflowError::Eligibility(EligibilityReason::AlreadyProcessed));
        }

        if order.status != OrderStatus::Completed {
            return Err(WorkflowError::Eligibility(EligibilityReason::NotCompleted));
        }

        if order.unknown_lines().is_empty() {
            return Err(WorkflowError::Eligibility(EligibilityReason::NoUnknownItems));
        }

        Ok(())
    }

    /// Submit a claim over a subset of `Unknown` lines. The refund amount is
    /// computed over exactly the selection, never trusted from the caller.
    pub async fn submit(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        selected_line_ids: Vec<Uuid>,
        action: ClaimAction,
    ) -> Result<ClaimRequest, WorkflowError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;
        Self::check_eligibility(&order, ctx.user_id)?;

        if selected_line_ids.is_empty() {
            return Err(WorkflowError::Validation(
                "a claim must select at least one line".to_string(),
            ));
        }

        let mut refund_amount_cents = 0i64;
        for line_id in &selected_line_ids {
            let line = order
                .line(*line_id)
                .ok_or(WorkflowError::IneligibleLine(*line_id))?;
            if line.availability != Availability::Unknown {
                return Err(WorkflowError::IneligibleLine(*line_id));
            }
            refund_amount_cents += line.line_total_cents();
        }

        match action {
            ClaimAction::Refund => {
                // Fail on a missing account before the status moves; once
                // the order reads Refunded the client cannot resubmit.
                if !self.settlement.account_exists(order.client_id).await? {
                    return Err(WorkflowError::NoAccount(order.client_id));
                }
                // The CAS guards against a double claim racing in: only one
                // submission leaves Completed.
                self.state
                    .advance_from(ctx, order_id, OrderStatus::Completed, OrderStatus::Refunded)
                    .await?;
                self.settlement
                    .credit(
                        ctx,
                        order.client_id,
                        refund_amount_cents,
                        order_id,
                        Some("claim refund for under-delivered items".to_string()),
                    )
                    .await?;
            }
            ClaimAction::Recollect => {
                self.state
                    .advance_from(
                        ctx,
                        order_id,
                        OrderStatus::Completed,
                        OrderStatus::RecollectFlagged,
                    )
                    .await?;
                self.store
                    .set_recollection_requested(order_id, true)
                    .await?;
            }
        }

        tracing::info!(
            order_id = %order_id,
            action = ?action,
            refund_amount_cents,
            selected = selected_line_ids.len(),
            "claim accepted"
        );

        Ok(ClaimRequest {
            order_id,
            client_id: ctx.user_id,
            selected_line_ids,
            action,
            refund_amount_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_core::{OrderLine, Role};
    use fulcrum_store::memory::{MemoryLedgerStore, MemoryOrderStore, MemoryStockRepository};

    struct Fixture {
        store: Arc<MemoryOrderStore>,
        ledger: Arc<MemoryLedgerStore>,
        claims: ClaimResolution,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryOrderStore::new());
        let ledger = Arc::new(MemoryLedgerStore::new());
        let stock = Arc::new(MemoryStockRepository::new());
        let settlement = Arc::new(PaymentSettlement::new(
            ledger.clone(),
            store.clone(),
            stock,
        ));
        let claims = ClaimResolution::new(store.clone(), settlement);
        Fixture {
            store,
            ledger,
            claims,
        }
    }

    fn client(id: Uuid) -> SessionContext {
        SessionContext::new(id, Role::Client)
    }

    /// Order #42 from the claims workflow: two lines, both Unknown.
    async fn seed_completed_order(fx: &Fixture, client_id: Uuid) -> Order {
        let mut order = Order::new(client_id, Uuid::new_v4());
        order.add_line(OrderLine::new(Uuid::new_v4(), "A".to_string(), 2, 100));
        order.add_line(OrderLine::new(Uuid::new_v4(), "B".to_string(), 1, 50));
        order.status = OrderStatus::Completed;
        fx.store.insert_order(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_refund_both_unknown_lines() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        fx.ledger.seed_account(client_id, 0);
        let order = seed_completed_order(&fx, client_id).await;
        let selected: Vec<Uuid> = order.lines.iter().map(|l| l.id).collect();

        let claim = fx
            .claims
            .submit(&client(client_id), order.id, selected, ClaimAction::Refund)
            .await
            .unwrap();

        assert_eq!(claim.refund_amount_cents, 250);
        assert_eq!(fx.ledger.balance(client_id), Some(250));
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_amount_covers_exactly_the_selection() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        fx.ledger.seed_account(client_id, 0);
        let order = seed_completed_order(&fx, client_id).await;
        // Select only line A (2 x 100).
        let selected = vec![order.lines[0].id];

        let claim = fx
            .claims
            .submit(&client(client_id), order.id, selected, ClaimAction::Refund)
            .await
            .unwrap();
        assert_eq!(claim.refund_amount_cents, 200);
        assert_eq!(fx.ledger.balance(client_id), Some(200));
    }

    #[tokio::test]
    async fn test_refund_without_account_leaves_order_completed() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        // No payment account provisioned for this client.
        let order = seed_completed_order(&fx, client_id).await;
        let selected: Vec<Uuid> = order.lines.iter().map(|l| l.id).collect();

        let result = fx
            .claims
            .submit(
                &client(client_id),
                order.id,
                selected.clone(),
                ClaimAction::Refund,
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::NoAccount(_))));

        // The order never left Completed, so the claim can be retried.
        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);

        fx.ledger.seed_account(client_id, 0);
        let claim = fx
            .claims
            .submit(&client(client_id), order.id, selected, ClaimAction::Refund)
            .await
            .unwrap();
        assert_eq!(claim.refund_amount_cents, 250);
        assert_eq!(fx.ledger.balance(client_id), Some(250));
    }

    #[tokio::test]
    async fn test_recollect_flags_order_for_matching() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        let order = seed_completed_order(&fx, client_id).await;
        let selected: Vec<Uuid> = order.lines.iter().map(|l| l.id).collect();

        fx.claims
            .submit(&client(client_id), order.id, selected, ClaimAction::Recollect)
            .await
            .unwrap();

        let stored = fx.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::RecollectFlagged);
        assert!(stored.recollection_requested);
    }

    #[tokio::test]
    async fn test_not_completed_rejected_regardless_of_unknown_lines() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        for status in [
            OrderStatus::Created,
            OrderStatus::PendingPayment,
            OrderStatus::Processing,
            OrderStatus::Collected,
            OrderStatus::Problem,
            OrderStatus::Cancelled,
        ] {
            let mut order = Order::new(client_id, Uuid::new_v4());
            order.add_line(OrderLine::new(Uuid::new_v4(), "A".to_string(), 1, 100));
            order.status = status;
            fx.store.insert_order(&order).await.unwrap();

            let result = fx
                .claims
                .submit(
                    &client(client_id),
                    order.id,
                    vec![order.lines[0].id],
                    ClaimAction::Refund,
                )
                .await;
            assert!(
                matches!(
                    result,
                    Err(WorkflowError::Eligibility(EligibilityReason::NotCompleted))
                ),
                "status {status} should be not_completed"
            );
        }
    }

    #[tokio::test]
    async fn test_claim_branch_orders_read_as_already_processed() {
        let fx = fixture();
        let client_id = Uuid::new_v4();

        for (status, recollection) in [
            (OrderStatus::Refunded, false),
            (OrderStatus::RecollectFlagged, true),
            (OrderStatus::Processing, true),
        ] {
            let mut order = Order::new(client_id, Uuid::new_v4());
            order.add_line(OrderLine::new(Uuid::new_v4(), "A".to_string(), 1, 100));
            order.status = status;
            order.recollection_requested = recollection;
            fx.store.insert_order(&order).await.unwrap();

            let result = fx
                .claims
                .submit(
                    &client(client_id),
                    order.id,
                    vec![order.lines[0].id],
                    ClaimAction::Refund,
                )
                .await;
            assert!(
                matches!(
                    result,
                    Err(WorkflowError::Eligibility(EligibilityReason::AlreadyProcessed))
                ),
                "status {status} should be already_processed"
            );
        }
    }

    #[tokio::test]
    async fn test_no_unknown_items_rejected() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        let mut order = Order::new(client_id, Uuid::new_v4());
        let mut line = OrderLine::new(Uuid::new_v4(), "A".to_string(), 1, 100);
        line.availability = Availability::Available;
        order.add_line(line);
        order.status = OrderStatus::Completed;
        fx.store.insert_order(&order).await.unwrap();

        let result = fx
            .claims
            .submit(
                &client(client_id),
                order.id,
                vec![order.lines[0].id],
                ClaimAction::Refund,
            )
            .await;
        assert!(matches!(
            result,
            Err(WorkflowError::Eligibility(EligibilityReason::NoUnknownItems))
        ));
    }

    #[tokio::test]
    async fn test_selecting_available_or_missing_line_rejected() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        let mut order = Order::new(client_id, Uuid::new_v4());
        order.add_line(OrderLine::new(Uuid::new_v4(), "U".to_string(), 1, 100));
        let mut available = OrderLine::new(Uuid::new_v4(), "A".to_string(), 1, 100);
        available.availability = Availability::Available;
        order.add_line(available);
        let mut missing = OrderLine::new(Uuid::new_v4(), "M".to_string(), 1, 100);
        missing.availability = Availability::Missing;
        order.add_line(missing);
        order.status = OrderStatus::Completed;
        fx.store.insert_order(&order).await.unwrap();

        for bad in [order.lines[1].id, order.lines[2].id] {
            let result = fx
                .claims
                .submit(&client(client_id), order.id, vec![bad], ClaimAction::Refund)
                .await;
            assert!(matches!(result, Err(WorkflowError::IneligibleLine(id)) if id == bad));
        }
    }

    #[tokio::test]
    async fn test_foreign_order_rejected() {
        let fx = fixture();
        let order = seed_completed_order(&fx, Uuid::new_v4()).await;

        let result = fx
            .claims
            .submit(
                &client(Uuid::new_v4()),
                order.id,
                vec![order.lines[0].id],
                ClaimAction::Refund,
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_underdelivered_only_completed_unknown() {
        let fx = fixture();
        let client_id = Uuid::new_v4();
        let completed = seed_completed_order(&fx, client_id).await;

        // Processing order: its unknown lines do not show up.
        let mut in_flight = Order::new(client_id, Uuid::new_v4());
        in_flight.add_line(OrderLine::new(Uuid::new_v4(), "X".to_string(), 1, 10));
        in_flight.status = OrderStatus::Processing;
        fx.store.insert_order(&in_flight).await.unwrap();

        let lines = fx
            .claims
            .list_underdelivered(&client(client_id))
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.cart_id == completed.id));
    }
}
