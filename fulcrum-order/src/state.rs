use chrono::Utc;
use fulcrum_core::{
    OrderStatus, OrderStore, SessionContext, TransitionRecord, WorkflowError,
};
use std::sync::Arc;
use uuid::Uuid;

/// Validates and applies status transitions for a single order.
///
/// Every mutation goes through a compare-and-swap on the expected prior
/// status, so two actors racing on the same order cannot both win: the loser
/// gets `StaleWrite` instead of silently overwriting. Applied transitions are
/// appended to the store's transition log, which is the sole audit trail.
pub struct OrderStateMachine {
    store: Arc<dyn OrderStore>,
}

impl OrderStateMachine {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Advance from whatever status the order currently has. Reads the
    /// current status and delegates to the conditional form, so a writer that
    /// read a stale status still cannot clobber a concurrent transition.
    pub async fn advance(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<(), WorkflowError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;
        self.advance_from(ctx, order_id, order.status, target).await
    }

    /// Advance with an explicit expected prior status. Fails with
    /// `InvalidTransition` if `target` is not a direct successor of
    /// `expected` (re-applying the current status included), and with
    /// `StaleWrite` if the stored status moved on since `expected` was read.
    pub async fn advance_from(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<(), WorkflowError> {
        if !expected.can_advance_to(target) {
            return Err(WorkflowError::InvalidTransition {
                from: expected,
                to: target,
            });
        }

        let applied = self
            .store
            .update_status_if(order_id, expected, target)
            .await?;
        if !applied {
            return Err(WorkflowError::StaleWrite(order_id, expected));
        }

        let record = TransitionRecord {
            order_id,
            from: expected,
            to: target,
            actor: ctx.actor_label(),
            at: Utc::now(),
        };
        self.store.append_transition(&record).await?;

        tracing::info!(
            order_id = %order_id,
            from = %expected,
            to = %target,
            actor = %record.actor,
            "order transition applied"
        );

        Ok(())
    }

    /// Full transition history for an order, oldest first.
    pub async fn history(&self, order_id: Uuid) -> Result<Vec<TransitionRecord>, WorkflowError> {
        Ok(self.store.transitions(order_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_core::{Order, Role};
    use fulcrum_store::memory::MemoryOrderStore;

    fn office_ctx() -> SessionContext {
        SessionContext::new(Uuid::new_v4(), Role::Office)
    }

    async fn seed_order(store: &Arc<MemoryOrderStore>, status: OrderStatus) -> Uuid {
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4());
        order.status = status;
        store.insert_order(&order).await.unwrap();
        order.id
    }

    #[tokio::test]
    async fn test_happy_path_lifecycle() {
        let store = Arc::new(MemoryOrderStore::new());
        let sm = OrderStateMachine::new(store.clone());
        let ctx = office_ctx();
        let id = seed_order(&store, OrderStatus::Created).await;

        for target in [
            OrderStatus::PendingPayment,
            OrderStatus::Processing,
            OrderStatus::Collected,
            OrderStatus::Completed,
        ] {
            sm.advance(&ctx, id, target).await.unwrap();
        }

        let order = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_transition_graph_is_closed() {
        // Every (from, to) pair outside the table must be rejected,
        // including re-applying the current status.
        let ctx = office_ctx();
        for &from in OrderStatus::all() {
            for &to in OrderStatus::all() {
                let store = Arc::new(MemoryOrderStore::new());
                let sm = OrderStateMachine::new(store.clone());
                let id = seed_order(&store, from).await;

                let result = sm.advance(&ctx, id, to).await;
                if from.can_advance_to(to) {
                    result.unwrap();
                } else {
                    assert!(
                        matches!(result, Err(WorkflowError::InvalidTransition { .. })),
                        "{from} -> {to} should be rejected"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_stale_writer_is_rejected() {
        let store = Arc::new(MemoryOrderStore::new());
        let sm = OrderStateMachine::new(store.clone());
        let ctx = office_ctx();
        let id = seed_order(&store, OrderStatus::Processing).await;

        // First writer wins.
        sm.advance_from(&ctx, id, OrderStatus::Processing, OrderStatus::Collected)
            .await
            .unwrap();

        // Second writer read Processing before the first committed.
        let result = sm
            .advance_from(&ctx, id, OrderStatus::Processing, OrderStatus::Problem)
            .await;
        assert!(matches!(result, Err(WorkflowError::StaleWrite(..))));
    }

    #[tokio::test]
    async fn test_transitions_are_logged_in_order() {
        let store = Arc::new(MemoryOrderStore::new());
        let sm = OrderStateMachine::new(store.clone());
        let ctx = office_ctx();
        let id = seed_order(&store, OrderStatus::Created).await;

        sm.advance(&ctx, id, OrderStatus::PendingPayment).await.unwrap();
        sm.advance(&ctx, id, OrderStatus::Processing).await.unwrap();

        let log = sm.history(id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].from, OrderStatus::Created);
        assert_eq!(log[0].to, OrderStatus::PendingPayment);
        assert_eq!(log[1].to, OrderStatus::Processing);
        assert!(log[0].at <= log[1].at);
    }

    #[tokio::test]
    async fn test_advance_unknown_order() {
        let store = Arc::new(MemoryOrderStore::new());
        let sm = OrderStateMachine::new(store);
        let result = sm
            .advance(&office_ctx(), Uuid::new_v4(), OrderStatus::Processing)
            .await;
        assert!(matches!(result, Err(WorkflowError::OrderNotFound(_))));
    }
}
