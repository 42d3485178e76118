pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth_handlers;
use crate::billing::handlers as billing_handlers;
use crate::generation::handlers as generation_handlers;
use crate::jobs;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth API
        .route("/api/v1/auth/register", post(auth_handlers::handle_register))
        .route("/api/v1/auth/login", post(auth_handlers::handle_login))
        .route("/api/v1/auth/logout", post(auth_handlers::handle_logout))
        // Billing API
        .route(
            "/api/v1/billing/checkout",
            post(billing_handlers::handle_checkout),
        )
        .route(
            "/api/v1/billing/webhook",
            post(billing_handlers::handle_webhook),
        )
        .route("/api/v1/billing/usage", get(billing_handlers::handle_usage))
        // Generation API
        .route("/api/v1/generate", post(generation_handlers::handle_generate))
        // Jobs API
        .route("/api/v1/jobs", get(jobs::handle_search))
        .with_state(state)
}
