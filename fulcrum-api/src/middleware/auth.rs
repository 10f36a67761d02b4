use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use fulcrum_core::{Role, SessionContext};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

fn decode_session(state: &AppState, req: &Request) -> Result<SessionContext, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let role = match token_data.claims.role.as_str() {
        "CLIENT" => Role::Client,
        "COLLECTOR" => Role::Collector,
        "OFFICE" => Role::Office,
        _ => return Err(StatusCode::FORBIDDEN),
    };

    Ok(SessionContext::new(user_id, role))
}

async fn role_middleware(
    state: AppState,
    required: Role,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = decode_session(&state, &req)?;
    if session.role != required {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

// ============================================================================
// Role Middlewares
// ============================================================================

pub async fn client_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    role_middleware(state, Role::Client, req, next).await
}

pub async fn collector_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    role_middleware(state, Role::Collector, req, next).await
}

pub async fn office_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    role_middleware(state, Role::Office, req, next).await
}
