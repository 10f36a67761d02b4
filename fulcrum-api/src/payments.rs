use axum::{extract::State, Extension, Json};
use fulcrum_core::{SessionContext, WorkflowError};
use fulcrum_shared::models::events::{OrderPaidEvent, SettlementEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAccountRequest {
    pub user_id: Uuid,
    pub card_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAccountResponse {
    pub status: String,
    pub card_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub order_id: Uuid,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    pub status: String,
    pub new_balance: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub order_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub status: String,
    pub order_status: String,
}

fn verify_actor(session: &SessionContext, body_id: Uuid) -> Result<(), WorkflowError> {
    if session.user_id != body_id {
        return Err(WorkflowError::Validation(
            "userId does not match the authenticated client".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/payments/accounts
/// Provision the caller's payment account. One per owner.
pub async fn provision_account(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ProvisionAccountRequest>,
) -> Result<Json<ProvisionAccountResponse>, AppError> {
    verify_actor(&session, req.user_id)?;

    let account = state
        .settlement
        .provision_account(&session, req.user_id, &req.card_number)
        .await?;

    Ok(Json(ProvisionAccountResponse {
        status: "created".to_string(),
        card_ref: account.card_ref,
    }))
}

/// POST /v1/payments/withdraw
/// Phase one of settlement: debit the balance, record the pending entry.
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, AppError> {
    verify_actor(&session, req.user_id)?;

    let new_balance = state
        .settlement
        .withdraw(
            &session,
            req.user_id,
            req.amount,
            req.order_id,
            req.description,
        )
        .await?;

    Ok(Json(WithdrawResponse {
        status: "withdrawn".to_string(),
        new_balance,
    }))
}

/// POST /v1/payments/confirm
/// Phase two: deduct stock, confirm the ledger entry, move the order into
/// processing. A failure here leaves the phase-one debit in place.
pub async fn confirm(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let order = state
        .settlement
        .confirm_payment(&session, req.order_id, req.amount)
        .await?;

    state
        .telemetry
        .order_paid(OrderPaidEvent {
            order_id: order.id,
            client_id: order.client_id,
            total_cents: order.total_cents,
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;
    state
        .telemetry
        .settlement(SettlementEvent {
            order_id: order.id,
            amount_cents: req.amount,
            event_type: "PAYMENT".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

    Ok(Json(ConfirmResponse {
        status: "confirmed".to_string(),
        order_status: order.status.to_string(),
    }))
}
