use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod claims;
pub mod collector;
pub mod error;
pub mod middleware;
pub mod office;
pub mod payments;
pub mod state;

pub use state::AppState;

use middleware::auth::{client_auth_middleware, collector_auth_middleware, office_auth_middleware};
use middleware::resiliency::circuit_breaker_middleware;

fn collection_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/collection/orders", get(collector::list_orders))
        .route(
            "/v1/collection/orders/{cart_id}/check",
            post(collector::check_availability),
        )
        .route(
            "/v1/collection/orders/{cart_id}/report-missing",
            post(collector::report_missing),
        )
        .route(
            "/v1/collection/orders/{cart_id}/complete",
            post(collector::complete_collection),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            collector_auth_middleware,
        ))
}

fn office_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/office/problems", get(office::list_problems))
        .route(
            "/v1/office/problems/{order_id}/notify",
            post(office::notify_client),
        )
        .route(
            "/v1/office/problems/{order_id}/decision",
            post(office::make_decision),
        )
        .route("/v1/office/recollect", get(office::list_recollect))
        .route(
            "/v1/office/recollect/{cart_id}/match",
            post(office::match_warehouse),
        )
        .route(
            "/v1/office/settlement/stale",
            get(office::stale_withdrawals),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            office_auth_middleware,
        ))
}

fn payment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/payments/accounts", post(payments::provision_account))
        .route("/v1/payments/withdraw", post(payments::withdraw))
        .route("/v1/payments/confirm", post(payments::confirm))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            client_auth_middleware,
        ))
}

fn claim_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/claims/underdelivered", get(claims::list_underdelivered))
        .route("/v1/claims/{cart_id}", post(claims::submit_claim))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            client_auth_middleware,
        ))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(collection_routes(&state))
        .merge(office_routes(&state))
        .merge(payment_routes(&state))
        .merge(claim_routes(&state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            circuit_breaker_middleware,
        ))
        .with_state(state)
}
