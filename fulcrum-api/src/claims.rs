use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fulcrum_core::{ClaimAction, SessionContext};
use fulcrum_shared::models::events::ClaimResolvedEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderdeliveredResponse {
    pub success: bool,
    pub items: Vec<UnderdeliveredItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderdeliveredItem {
    pub cart_id: Uuid,
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: i64,
    pub availability: fulcrum_core::Availability,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimRequest {
    pub action: ClaimAction,
    pub selected_line_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimResponse {
    pub success: bool,
    pub action: ClaimAction,
    pub refund_amount: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/claims/underdelivered
/// Unknown lines across the caller's completed orders; the claim wizard's
/// first screen.
pub async fn list_underdelivered(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<UnderdeliveredResponse>, AppError> {
    let lines = state.claims.list_underdelivered(&session).await?;
    Ok(Json(UnderdeliveredResponse {
        success: true,
        items: lines
            .into_iter()
            .map(|l| UnderdeliveredItem {
                cart_id: l.cart_id,
                line_id: l.line_id,
                product_id: l.product_id,
                product_name: l.product_name,
                quantity: l.quantity,
                price: l.unit_price_cents,
                availability: l.availability,
            })
            .collect(),
    }))
}

/// POST /v1/claims/:cartId
/// Submit a refund or re-collection claim over selected lines.
pub async fn submit_claim(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(cart_id): Path<Uuid>,
    Json(req): Json<SubmitClaimRequest>,
) -> Result<Json<SubmitClaimResponse>, AppError> {
    let claim = state
        .claims
        .submit(&session, cart_id, req.selected_line_ids, req.action)
        .await?;

    state
        .telemetry
        .claim_resolved(ClaimResolvedEvent {
            order_id: claim.order_id,
            client_id: claim.client_id,
            action: match claim.action {
                ClaimAction::Refund => "refund".to_string(),
                ClaimAction::Recollect => "recollect".to_string(),
            },
            refund_cents: claim.refund_amount_cents,
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

    Ok(Json(SubmitClaimResponse {
        success: true,
        action: claim.action,
        refund_amount: claim.refund_amount_cents,
    }))
}
