use crate::matching::{WarehouseCheck, WarehouseSelector};
use crate::settlement::PaymentSettlement;
use crate::state::OrderStateMachine;
use chrono::Utc;
use fulcrum_core::{
    Notifier, Order, OrderStatus, OrderStore, ProblemDecision, ProblemReport, ProblemStatus,
    SessionContext, Warehouse, WorkflowError,
};
use fulcrum_shared::pii::Masked;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What a decision did, for the office surface.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub order_id: Uuid,
    pub decision: ProblemDecision,
    pub new_status: OrderStatus,
    pub refunded_cents: Option<i64>,
}

/// Result of the automatic warehouse matching for a recollect-flagged order.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub order_id: Uuid,
    pub found: bool,
    pub warehouse: Option<Warehouse>,
    pub warehouse_checks: Vec<WarehouseCheck>,
}

/// Office-side resolution of problem orders plus the automatic warehouse
/// matching for recollect-flagged ones. Two responsibilities, one surface.
pub struct ExceptionMediator {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
    settlement: Arc<PaymentSettlement>,
    selector: Arc<dyn WarehouseSelector>,
    state: OrderStateMachine,
    /// Whether a cancel decision automatically refunds the paid total. The
    /// source never made this call; it is configuration, not a guess.
    refund_on_cancel: bool,
}

impl ExceptionMediator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
        settlement: Arc<PaymentSettlement>,
        selector: Arc<dyn WarehouseSelector>,
        refund_on_cancel: bool,
    ) -> Self {
        let state = OrderStateMachine::new(store.clone());
        Self {
            store,
            notifier,
            settlement,
            selector,
            state,
            refund_on_cancel,
        }
    }

    /// The office poll surface: every unresolved problem report.
    pub async fn list_problems(&self) -> Result<Vec<ProblemReport>, WorkflowError> {
        let mut reports = self.store.list_problems(None).await?;
        reports.retain(|r| r.is_active());
        Ok(reports)
    }

    /// Compose and send the client-facing message enumerating the affected
    /// lines, then flip the report Pending -> Notified.
    pub async fn notify_client(
        &self,
        _ctx: &SessionContext,
        order_id: Uuid,
        message: Option<String>,
        client_email: Masked<String>,
        client_name: &str,
    ) -> Result<(), WorkflowError> {
        let mut report = self
            .store
            .active_problem(order_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::Validation(format!("no active problem report for order {}", order_id))
            })?;
        if report.status != ProblemStatus::Pending {
            return Err(WorkflowError::Validation(format!(
                "client already notified for order {}",
                order_id
            )));
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        let body = match message {
            Some(text) => text,
            None => Self::compose_problem_message(&order, &report),
        };
        self.notifier
            .send(&client_email, client_name, "Problem with your order", &body)
            .await?;

        report.status = ProblemStatus::Notified;
        self.store.update_problem(&report).await?;

        tracing::info!(order_id = %order_id, "client notified about problem order");
        Ok(())
    }

    /// Apply an office decision to a problem order.
    pub async fn make_decision(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
        decision: ProblemDecision,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let mut report = self
            .store
            .active_problem(order_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::Validation(format!("no active problem report for order {}", order_id))
            })?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;

        let outcome = match decision {
            ProblemDecision::ApproveWithoutItem => {
                // The missing lines stop being billed; the lines themselves
                // stay on the order for the audit trail.
                let new_total = order.billed_total_cents();
                self.store.set_total(order_id, new_total).await?;
                self.state
                    .advance_from(ctx, order_id, OrderStatus::Problem, OrderStatus::Completed)
                    .await?;
                self.resolve(&mut report, decision).await?;
                DecisionOutcome {
                    order_id,
                    decision,
                    new_status: OrderStatus::Completed,
                    refunded_cents: None,
                }
            }
            ProblemDecision::CancelOrder => {
                self.state
                    .advance_from(ctx, order_id, OrderStatus::Problem, OrderStatus::Cancelled)
                    .await?;
                self.resolve(&mut report, decision).await?;

                let refunded_cents = if self.refund_on_cancel {
                    let amount = order.total_cents;
                    self.settlement
                        .credit(
                            ctx,
                            order.client_id,
                            amount,
                            order_id,
                            Some("refund on cancelled order".to_string()),
                        )
                        .await?;
                    Some(amount)
                } else {
                    None
                };
                DecisionOutcome {
                    order_id,
                    decision,
                    new_status: OrderStatus::Cancelled,
                    refunded_cents,
                }
            }
            ProblemDecision::WaitForItem => {
                // Order stays in Problem pending a re-check; only the
                // decision is recorded.
                report.decision = Some(decision);
                self.store.update_problem(&report).await?;
                DecisionOutcome {
                    order_id,
                    decision,
                    new_status: OrderStatus::Problem,
                    refunded_cents: None,
                }
            }
        };

        tracing::info!(
            order_id = %order_id,
            decision = ?decision,
            new_status = %outcome.new_status,
            "problem decision applied"
        );
        Ok(outcome)
    }

    /// Orders waiting for the automatic warehouse matching.
    pub async fn list_recollect_flagged(&self) -> Result<Vec<Order>, WorkflowError> {
        Ok(self
            .store
            .list_by_status(OrderStatus::RecollectFlagged)
            .await?)
    }

    /// All-or-nothing warehouse search for one recollect-flagged order. On a
    /// match the order is reassigned and re-enters `Processing`; otherwise it
    /// stays flagged and the per-warehouse counts go back to the caller for
    /// manual handling.
    pub async fn find_matching_warehouse(
        &self,
        ctx: &SessionContext,
        order_id: Uuid,
    ) -> Result<MatchOutcome, WorkflowError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(WorkflowError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::RecollectFlagged {
            return Err(WorkflowError::Validation(format!(
                "order {} is {}, matching operates on RECOLLECT_FLAGGED orders",
                order_id, order.status
            )));
        }

        let (selected, warehouse_checks) = self.selector.select(&order).await?;

        let Some(warehouse) = selected else {
            tracing::info!(
                order_id = %order_id,
                warehouses_probed = warehouse_checks.len(),
                "no warehouse satisfies all unknown lines"
            );
            return Ok(MatchOutcome {
                order_id,
                found: false,
                warehouse: None,
                warehouse_checks,
            });
        };

        self.store.set_warehouse(order_id, warehouse.id).await?;
        self.state
            .advance_from(
                ctx,
                order_id,
                OrderStatus::RecollectFlagged,
                OrderStatus::Processing,
            )
            .await?;

        tracing::info!(
            order_id = %order_id,
            warehouse = %warehouse.name,
            "order reassigned for re-collection"
        );

        Ok(MatchOutcome {
            order_id,
            found: true,
            warehouse: Some(warehouse),
            warehouse_checks,
        })
    }

    fn compose_problem_message(order: &Order, report: &ProblemReport) -> String {
        let mut lines = String::new();
        for line in order.missing_lines() {
            lines.push_str(&format!("  - {} x{}\n", line.product_name, line.quantity));
        }
        format!(
            "Some items in your order {} could not be collected:\n{}Collector note: {}\n\
             We will contact you about how to proceed.",
            order.id, lines, report.detail
        )
    }

    async fn resolve(
        &self,
        report: &mut ProblemReport,
        decision: ProblemDecision,
    ) -> Result<(), WorkflowError> {
        report.status = ProblemStatus::Resolved;
        report.decision = Some(decision);
        report.resolved_at = Some(Utc::now());
        self.store.update_problem(report).await?;
        Ok(())
    }
}
