use crate::state::OrderStateMachine;
use fulcrum_core::{
    Availability, Order, OrderStatus, OrderStore, ProblemReport, SessionContext, StockRepository,
    WorkflowError,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Result of a per-line stock check.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityCheck {
    pub order_id: Uuid,
    pub all_available: bool,
    pub unavailable: Vec<UnavailableLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnavailableLine {
    pub product_id: Uuid,
    pub product_name: String,
}

/// Drives a collector's interaction with one order: availability check,
/// missing-item reporting, completion. Operates only on orders in
/// `Processing`; the collector-facing list is refreshed by polling, so two
/// collectors can pick the same order; the status CAS decides who commits.
pub struct CollectionWorkflow {
    store: Arc<dyn OrderStore>,
    stock: Arc<dyn StockRepository>,
    state: OrderStateMachine,
}

impl CollectionWorkflow {
    pub fn new(store: Arc<dyn OrderStore>, stock: Arc<dyn StockRepository>) -> Self {
        let state = OrderStateMachine::new(store.clone());
        Self { store, stock, state }
    }

    /// The collector-facing poll surface: all orders currently collectible.
    pub async fn list_collectible(&self) -> Result<Vec<Order>, WorkflowError> {
        Ok(self.store.list_by_status(OrderStatus::Processing).await?)
    }

    /// Query current stock for every line and tag lines covered by stock as
    /// `Available`. Shortfall lines stay `Unknown`: their physical presence
    /// is undetermined until a collector either finds them or actively
    /// reports them missing. Does not change order status.
    pub async fn check_availability(
        &self,
        _ctx: &SessionContext,
        order_id: Uuid,
    ) -> Result<AvailabilityCheck, WorkflowError> {
        let mut order = self.processing_order(order_id).await?;

        let mut unavailable = Vec::new();
        for line in order.lines.iter_mut() {
            // Lines the office already approved dropping stay as they are.
            if line.availability == Availability::Missing {
                continue;
            }
            let on_hand = self
                .stock
                .available_quantity(order.warehouse_id, line.product_id)
                .await?;
            if on_hand >= line.quantity {
                line.availability = Availability::Available;
            } else {
                line.availability = Availability::Unknown;
                unavailable.push(UnavailableLine {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                });
            }
        }

        self.store.update_lines(order_id, &order.lines).await?;

        tracing::debug!(
            order_id = %order_id,
            unavailable = unavailable.len(),
            "availability check recorded"
        );

        Ok(AvailabilityCheck {
            order_id,
            all_available: unavailable.is_empty(),
            unavailable,
        })
    }

    /// Collector actively could not find a line: tag it `Missing`, open the
    /// problem report and move the order to `Problem` for the office.
    pub async fn report_missing(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        product_id: Uuid,
        detail: String,
    ) -> Result<ProblemReport, WorkflowError> {
        let mut order = self.processing_order(order_id).await?;

        if order.line_by_product(product_id).is_none() {
            return Err(WorkflowError::NoSuchLine { order_id, product_id });
        }
        if self.store.active_problem(order_id).await?.is_some() {
            return Err(WorkflowError::Validation(format!(
                "order {} already has an active problem report",
                order_id
            )));
        }

        for line in order.lines.iter_mut() {
            if line.product_id == product_id {
                line.availability = Availability::Missing;
            }
        }
        self.store.update_lines(order_id, &order.lines).await?;

        let report = ProblemReport::new(order_id, ctx.user_id, product_id, detail);
        self.store.insert_problem(&report).await?;

        self.state
            .advance_from(ctx, order_id, OrderStatus::Processing, OrderStatus::Problem)
            .await?;

        tracing::info!(
            order_id = %order_id,
            product_id = %product_id,
            collector_id = %ctx.user_id,
            "missing item reported"
        );

        Ok(report)
    }

    /// Allowed only when the last availability check confirmed every line:
    /// any line still `Unknown` means presence was never confirmed and the
    /// order is `NotReady`. Records the collector as the order's fulfiller.
    pub async fn complete_collection(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
    ) -> Result<Order, WorkflowError> {
        let order = self.processing_order(order_id).await?;

        if order
            .lines
            .iter()
            .any(|l| l.availability == Availability::Unknown)
        {
            return Err(WorkflowError::NotReady(order_id));
        }

        // Win the CAS first; only the committed writer records itself as
        // the fulfiller.
        self.state
            .advance_from(ctx, order_id, OrderStatus::Processing, OrderStatus::Collected)
            .await?;
        self.store.set_collector(order_id, ctx.user_id).await?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        tracing::info!(
            order_id = %order_id,
            collector_id = %ctx.user_id,
            "collection completed"
        );

        Ok(order)
    }

    async fn processing_order(&self, order_id: Uuid) -> Result<Order, WorkflowError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::Processing {
            return Err(WorkflowError::Validation(format!(
                "order {} is {}, collection operates on PROCESSING orders",
                order_id, order.status
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_core::{OrderLine, Role};
    use fulcrum_store::memory::{MemoryOrderStore, MemoryStockRepository};

    struct Fixture {
        store: Arc<MemoryOrderStore>,
        stock: Arc<MemoryStockRepository>,
        workflow: CollectionWorkflow,
        warehouse_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryOrderStore::new());
        let stock = Arc::new(MemoryStockRepository::new());
        let warehouse_id = stock.add_warehouse("Main");
        let workflow = CollectionWorkflow::new(store.clone(), stock.clone());
        Fixture {
            store,
            stock,
            workflow,
            warehouse_id,
        }
    }

    fn collector() -> SessionContext {
        SessionContext::new(Uuid::new_v4(), Role::Collector)
    }

    async fn seed_processing_order(fx: &Fixture, lines: Vec<(Uuid, &str, u32, i64)>) -> Uuid {
        let mut order = Order::new(Uuid::new_v4(), fx.warehouse_id);
        for (product_id, name, qty, price) in lines {
            order.add_line(OrderLine::new(product_id, name.to_string(), qty, price));
        }
        order.status = OrderStatus::Processing;
        fx.store.insert_order(&order).await.unwrap();
        order.id
    }

    #[tokio::test]
    async fn test_check_tags_available_and_leaves_shortfall_unknown() {
        let fx = fixture();
        let in_stock = Uuid::new_v4();
        let short = Uuid::new_v4();
        fx.stock.set_quantity(fx.warehouse_id, in_stock, 10);
        fx.stock.set_quantity(fx.warehouse_id, short, 1);

        let id = seed_processing_order(&fx, vec![(in_stock, "Milk", 2, 150), (short, "Eggs", 3, 90)]).await;
        let check = fx.workflow.check_availability(&collector(), id).await.unwrap();

        assert!(!check.all_available);
        assert_eq!(check.unavailable.len(), 1);
        assert_eq!(check.unavailable[0].product_id, short);

        let order = fx.store.get_order(id).await.unwrap().unwrap();
        assert_eq!(
            order.line_by_product(in_stock).unwrap().availability,
            Availability::Available
        );
        assert_eq!(
            order.line_by_product(short).unwrap().availability,
            Availability::Unknown
        );
        // Status untouched.
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_complete_without_check_is_not_ready() {
        let fx = fixture();
        let id = seed_processing_order(&fx, vec![(Uuid::new_v4(), "Milk", 1, 150)]).await;

        let result = fx.workflow.complete_collection(&collector(), id).await;
        assert!(matches!(result, Err(WorkflowError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_complete_after_failed_check_is_not_ready() {
        let fx = fixture();
        let product = Uuid::new_v4();
        // No stock seeded: check leaves the line Unknown.
        let id = seed_processing_order(&fx, vec![(product, "Milk", 1, 150)]).await;

        let check = fx.workflow.check_availability(&collector(), id).await.unwrap();
        assert!(!check.all_available);

        let result = fx.workflow.complete_collection(&collector(), id).await;
        assert!(matches!(result, Err(WorkflowError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_complete_after_all_available_check() {
        let fx = fixture();
        let product = Uuid::new_v4();
        fx.stock.set_quantity(fx.warehouse_id, product, 5);
        let id = seed_processing_order(&fx, vec![(product, "Milk", 2, 150)]).await;
        let ctx = collector();

        let check = fx.workflow.check_availability(&ctx, id).await.unwrap();
        assert!(check.all_available);

        let order = fx.workflow.complete_collection(&ctx, id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Collected);
        assert_eq!(order.collector_id, Some(ctx.user_id));
    }

    #[tokio::test]
    async fn test_report_missing_moves_order_to_problem() {
        let fx = fixture();
        let product = Uuid::new_v4();
        let id = seed_processing_order(&fx, vec![(product, "Butter", 1, 320)]).await;
        let ctx = collector();

        let report = fx
            .workflow
            .report_missing(&ctx, id, product, "shelf empty, not in back room".to_string())
            .await
            .unwrap();

        assert_eq!(report.order_id, id);
        assert_eq!(report.collector_id, ctx.user_id);

        let order = fx.store.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Problem);
        assert_eq!(
            order.line_by_product(product).unwrap().availability,
            Availability::Missing
        );
    }

    #[tokio::test]
    async fn test_report_missing_unknown_product() {
        let fx = fixture();
        let id = seed_processing_order(&fx, vec![(Uuid::new_v4(), "Butter", 1, 320)]).await;

        let result = fx
            .workflow
            .report_missing(&collector(), id, Uuid::new_v4(), "not found".to_string())
            .await;
        assert!(matches!(result, Err(WorkflowError::NoSuchLine { .. })));
    }

    #[tokio::test]
    async fn test_second_report_on_same_order_rejected() {
        let fx = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let id = seed_processing_order(&fx, vec![(a, "A", 1, 100), (b, "B", 1, 100)]).await;
        let ctx = collector();

        fx.workflow
            .report_missing(&ctx, id, a, "missing".to_string())
            .await
            .unwrap();

        // Order left Processing, so the second report fails up front.
        let result = fx
            .workflow
            .report_missing(&ctx, id, b, "also missing".to_string())
            .await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_racing_collectors_second_completion_loses() {
        let fx = fixture();
        let product = Uuid::new_v4();
        fx.stock.set_quantity(fx.warehouse_id, product, 10);
        let id = seed_processing_order(&fx, vec![(product, "Milk", 1, 150)]).await;

        let first = collector();
        let second = collector();
        fx.workflow.check_availability(&first, id).await.unwrap();

        fx.workflow.complete_collection(&first, id).await.unwrap();
        let result = fx.workflow.complete_collection(&second, id).await;

        // The loser sees the order already out of Processing.
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
        let order = fx.store.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.collector_id, Some(first.user_id));
    }
}
