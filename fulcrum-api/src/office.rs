use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Duration;
use fulcrum_core::{ProblemDecision, ProblemStatus, SessionContext};
use fulcrum_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemsResponse {
    pub success: bool,
    pub poll_interval_seconds: u64,
    pub problems: Vec<ProblemView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemView {
    pub problem_id: Uuid,
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub collector_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub details: String,
    pub status: ProblemStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    /// Free-text override; when absent the affected-lines message is
    /// composed server-side.
    pub message: Option<String>,
    pub client_email: String,
    pub client_name: String,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub decision: ProblemDecision,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub new_status: String,
    pub refunded_amount: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecollectListResponse {
    pub success: bool,
    pub orders: Vec<RecollectOrder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecollectOrder {
    pub cart_id: Uuid,
    pub client_id: Uuid,
    pub unknown_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub success: bool,
    pub found: bool,
    pub warehouse: Option<MatchedWarehouse>,
    pub warehouse_checks: Vec<WarehouseCheckView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedWarehouse {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseCheckView {
    pub warehouse_name: String,
    pub available_items_count: usize,
    pub total_items: usize,
    pub all_available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleWithdrawalsResponse {
    pub success: bool,
    pub entries: Vec<StaleWithdrawal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleWithdrawal {
    pub entry_id: Uuid,
    pub owner_id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub created_date: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/office/problems
/// Every unresolved problem report, joined with order context.
pub async fn list_problems(
    State(state): State<AppState>,
    Extension(_session): Extension<SessionContext>,
) -> Result<Json<ProblemsResponse>, AppError> {
    let reports = state.mediator.list_problems().await?;

    let mut problems = Vec::with_capacity(reports.len());
    for report in reports {
        let order = state
            .orders
            .get_order(report.order_id)
            .await
            .map_err(fulcrum_core::WorkflowError::from)?
            .ok_or(fulcrum_core::WorkflowError::OrderNotFound(report.order_id))?;
        let product_name = order
            .line_by_product(report.product_id)
            .map(|l| l.product_name.clone());
        problems.push(ProblemView {
            problem_id: report.id,
            order_id: report.order_id,
            client_id: order.client_id,
            collector_id: report.collector_id,
            product_id: report.product_id,
            product_name,
            details: report.detail,
            status: report.status,
            created_at: report.created_at,
        });
    }

    Ok(Json(ProblemsResponse {
        success: true,
        poll_interval_seconds: state.business_rules.poll_interval_seconds,
        problems,
    }))
}

/// POST /v1/office/problems/:orderId/notify
/// Send the client-facing message about the affected lines.
pub async fn notify_client(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, AppError> {
    state
        .mediator
        .notify_client(
            &session,
            order_id,
            req.message,
            Masked(req.client_email),
            &req.client_name,
        )
        .await?;
    Ok(Json(NotifyResponse { success: true }))
}

/// POST /v1/office/problems/:orderId/decision
/// Apply an office decision to a problem order.
pub async fn make_decision(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    if let Some(comments) = &req.comments {
        tracing::info!(order_id = %order_id, comments, "decision comments");
    }

    let outcome = state
        .mediator
        .make_decision(&session, order_id, req.decision)
        .await?;

    state
        .telemetry
        .status_changed(fulcrum_shared::models::events::StatusChangedEvent {
            order_id,
            from: fulcrum_core::OrderStatus::Problem.to_string(),
            to: outcome.new_status.to_string(),
            actor: session.actor_label(),
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

    Ok(Json(DecisionResponse {
        success: true,
        order_id: outcome.order_id,
        new_status: outcome.new_status.to_string(),
        refunded_amount: outcome.refunded_cents,
    }))
}

/// GET /v1/office/recollect
/// Orders flagged for re-collection, waiting for warehouse matching.
pub async fn list_recollect(
    State(state): State<AppState>,
    Extension(_session): Extension<SessionContext>,
) -> Result<Json<RecollectListResponse>, AppError> {
    let orders = state.mediator.list_recollect_flagged().await?;
    Ok(Json(RecollectListResponse {
        success: true,
        orders: orders
            .iter()
            .map(|o| RecollectOrder {
                cart_id: o.id,
                client_id: o.client_id,
                unknown_count: o.unknown_lines().len(),
            })
            .collect(),
    }))
}

/// POST /v1/office/recollect/:cartId/match
/// All-or-nothing warehouse search for one flagged order.
pub async fn match_warehouse(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(cart_id): Path<Uuid>,
) -> Result<Json<MatchResponse>, AppError> {
    let outcome = state
        .mediator
        .find_matching_warehouse(&session, cart_id)
        .await?;

    Ok(Json(MatchResponse {
        success: true,
        found: outcome.found,
        warehouse: outcome.warehouse.map(|w| MatchedWarehouse {
            warehouse_id: w.id,
            warehouse_name: w.name,
        }),
        warehouse_checks: outcome
            .warehouse_checks
            .into_iter()
            .map(|c| WarehouseCheckView {
                warehouse_name: c.warehouse_name,
                available_items_count: c.available_items_count,
                total_items: c.total_items,
                all_available: c.all_available,
            })
            .collect(),
    }))
}

/// GET /v1/office/settlement/stale
/// Withdrawals whose confirm never arrived within the configured deadline.
pub async fn stale_withdrawals(
    State(state): State<AppState>,
    Extension(_session): Extension<SessionContext>,
) -> Result<Json<StaleWithdrawalsResponse>, AppError> {
    let deadline =
        Duration::seconds(state.business_rules.settlement_confirm_deadline_seconds as i64);
    let entries = state.settlement.stale_withdrawals(deadline).await?;
    Ok(Json(StaleWithdrawalsResponse {
        success: true,
        entries: entries
            .into_iter()
            .map(|e| StaleWithdrawal {
                entry_id: e.id,
                owner_id: e.owner_id,
                order_id: e.order_id,
                amount: e.amount_cents,
                created_date: e.created_at,
            })
            .collect(),
    }))
}
