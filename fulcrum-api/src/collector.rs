use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fulcrum_core::{Availability, Order, SessionContext, WorkflowError};
use fulcrum_shared::models::events::{ProblemReportedEvent, StatusChangedEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleOrdersResponse {
    pub success: bool,
    pub poll_interval_seconds: u64,
    pub orders: Vec<CollectibleOrder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleOrder {
    pub cart_id: Uuid,
    pub created_date: chrono::DateTime<chrono::Utc>,
    pub status: String,
    pub items: Vec<CollectibleItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub availability: Availability,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    pub all_available: bool,
    pub unavailable_items: Vec<UnavailableItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItem {
    pub product_id: Uuid,
    pub product_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMissingRequest {
    pub product_id: Uuid,
    pub detail: String,
    pub collector_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMissingResponse {
    pub success: bool,
    pub problem_id: Uuid,
    pub cart_updated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub collector_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub status: String,
}

fn collectible_order(order: &Order) -> CollectibleOrder {
    CollectibleOrder {
        cart_id: order.id,
        created_date: order.created_at,
        status: order.status.to_string(),
        items: order
            .lines
            .iter()
            .map(|l| CollectibleItem {
                product_id: l.product_id,
                product_name: l.product_name.clone(),
                quantity: l.quantity,
                availability: l.availability,
            })
            .collect(),
    }
}

/// The request body carries the acting collector id for audit parity with the
/// wire format; it must agree with the token.
fn verify_actor(session: &SessionContext, body_id: Uuid) -> Result<(), WorkflowError> {
    if session.user_id != body_id {
        return Err(WorkflowError::Validation(
            "collectorId does not match the authenticated collector".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/collection/orders
/// All orders currently waiting for collection.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<CollectibleOrdersResponse>, AppError> {
    let _ = session;
    let orders = state.collection.list_collectible().await?;
    Ok(Json(CollectibleOrdersResponse {
        success: true,
        poll_interval_seconds: state.business_rules.poll_interval_seconds,
        orders: orders.iter().map(collectible_order).collect(),
    }))
}

/// POST /v1/collection/orders/:cartId/check
/// Probe stock for every line and tag what is covered.
pub async fn check_availability(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(cart_id): Path<Uuid>,
) -> Result<Json<CheckResponse>, AppError> {
    let check = state
        .collection
        .check_availability(&session, cart_id)
        .await?;
    Ok(Json(CheckResponse {
        success: true,
        all_available: check.all_available,
        unavailable_items: check
            .unavailable
            .into_iter()
            .map(|l| UnavailableItem {
                product_id: l.product_id,
                product_name: l.product_name,
            })
            .collect(),
    }))
}

/// POST /v1/collection/orders/:cartId/report-missing
/// Collector could not find a line; opens the problem report.
pub async fn report_missing(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(cart_id): Path<Uuid>,
    Json(req): Json<ReportMissingRequest>,
) -> Result<Json<ReportMissingResponse>, AppError> {
    verify_actor(&session, req.collector_id)?;

    let report = state
        .collection
        .report_missing(&session, cart_id, req.product_id, req.detail)
        .await?;

    state
        .telemetry
        .problem_reported(ProblemReportedEvent {
            order_id: cart_id,
            collector_id: session.user_id,
            product_id: req.product_id,
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

    Ok(Json(ReportMissingResponse {
        success: true,
        problem_id: report.id,
        cart_updated: true,
    }))
}

/// POST /v1/collection/orders/:cartId/complete
/// All lines confirmed present: hand the order over.
pub async fn complete_collection(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(cart_id): Path<Uuid>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AppError> {
    verify_actor(&session, req.collector_id)?;

    let order = state
        .collection
        .complete_collection(&session, cart_id)
        .await?;

    state
        .telemetry
        .status_changed(StatusChangedEvent {
            order_id: order.id,
            from: fulcrum_core::OrderStatus::Processing.to_string(),
            to: order.status.to_string(),
            actor: session.actor_label(),
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

    Ok(Json(CompleteResponse {
        success: true,
        order_id: order.id,
        status: order.status.to_string(),
    }))
}
