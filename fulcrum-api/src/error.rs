use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fulcrum_core::{StoreError, WorkflowError};
use serde_json::json;

/// Boundary error type: maps the workflow taxonomy onto HTTP. Eligibility
/// rejections carry their machine-readable reason so callers can branch
/// without parsing messages.
#[derive(Debug)]
pub enum AppError {
    Workflow(WorkflowError),
    Anyhow(anyhow::Error),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Workflow(err) => workflow_response(err),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "error": "Internal Server Error"})),
                )
                    .into_response()
            }
        }
    }
}

fn workflow_response(err: WorkflowError) -> Response {
    let (status, reason) = match &err {
        WorkflowError::Validation(_) => (StatusCode::BAD_REQUEST, None),
        WorkflowError::OrderNotFound(_)
        | WorkflowError::NoAccount(_)
        | WorkflowError::NoSuchLine { .. } => (StatusCode::NOT_FOUND, None),
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::StaleWrite(..)
        | WorkflowError::NotReady(_)
        | WorkflowError::AlreadyExists(_) => (StatusCode::CONFLICT, None),
        WorkflowError::InsufficientFunds { .. } => (StatusCode::PAYMENT_REQUIRED, None),
        WorkflowError::Eligibility(reason) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Some(reason.as_str()))
        }
        WorkflowError::IneligibleLine(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
        WorkflowError::Store(store_err) => {
            let status = match store_err {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                // Retry-with-backoff belongs to the caller at this boundary;
                // the workflow itself made no state change.
                StoreError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            };
            (status, None)
        }
    };

    if status.is_server_error() {
        tracing::error!("workflow error surfaced as {}: {}", status, err);
    }

    let mut body = json!({
        "success": false,
        "error": err.to_string(),
    });
    if let Some(reason) = reason {
        body["reason"] = json!(reason);
    }

    (status, Json(body)).into_response()
}
