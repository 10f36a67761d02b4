use async_trait::async_trait;
use fulcrum_core::{Order, StockRepository, Warehouse, WorkflowError};
use serde::Serialize;
use std::sync::Arc;

/// Per-warehouse result of an all-or-nothing availability probe.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseCheck {
    pub warehouse_id: uuid::Uuid,
    pub warehouse_name: String,
    pub available_items_count: usize,
    pub total_items: usize,
    pub all_available: bool,
}

/// Selection policy for re-collection. Kept behind a trait so the policy can
/// be swapped without touching the mediator.
#[async_trait]
pub trait WarehouseSelector: Send + Sync {
    /// Probe warehouses for the order's `Unknown` lines. Returns the selected
    /// warehouse (if any) and the per-warehouse counts gathered on the way.
    async fn select(
        &self,
        order: &Order,
    ) -> Result<(Option<Warehouse>, Vec<WarehouseCheck>), WorkflowError>;
}

/// The shipped policy: iterate warehouses in listing order and take the first
/// one where every `Unknown` line is available in full. First match, not best
/// match.
pub struct FirstMatchSelector {
    stock: Arc<dyn StockRepository>,
}

impl FirstMatchSelector {
    pub fn new(stock: Arc<dyn StockRepository>) -> Self {
        Self { stock }
    }
}

#[async_trait]
impl WarehouseSelector for FirstMatchSelector {
    async fn select(
        &self,
        order: &Order,
    ) -> Result<(Option<Warehouse>, Vec<WarehouseCheck>), WorkflowError> {
        let wanted = order.unknown_lines();
        let mut checks = Vec::new();

        for warehouse in self.stock.list_warehouses().await? {
            let mut available = 0usize;
            for line in &wanted {
                let on_hand = self
                    .stock
                    .available_quantity(warehouse.id, line.product_id)
                    .await?;
                if on_hand >= line.quantity {
                    available += 1;
                }
            }

            let all_available = available == wanted.len() && !wanted.is_empty();
            checks.push(WarehouseCheck {
                warehouse_id: warehouse.id,
                warehouse_name: warehouse.name.clone(),
                available_items_count: available,
                total_items: wanted.len(),
                all_available,
            });

            if all_available {
                return Ok((Some(warehouse), checks));
            }
        }

        Ok((None, checks))
    }
}
