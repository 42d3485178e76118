//! Axum route handlers for the Billing API.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::extract::AuthUser;
use crate::billing::metering::UsageSnapshot;
use crate::billing::plans::PlanKey;
use crate::billing::reconciler::{self, Outcome};
use crate::billing::webhook::{self, EventEnvelope};
use crate::billing::checkout;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// POST /api/v1/billing/checkout
pub async fn handle_checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let plan_key = PlanKey::parse(&req.plan).ok_or_else(|| AppError::InvalidPlan(req.plan.clone()))?;

    let url = checkout::start_checkout(&state, &user, plan_key).await?;
    Ok(Json(CheckoutResponse { url }))
}

/// GET /api/v1/billing/usage
pub async fn handle_usage(AuthUser(user): AuthUser) -> Json<UsageSnapshot> {
    Json(UsageSnapshot {
        generation_limit: user.generation_limit,
        generation_count: user.generation_count,
    })
}

/// POST /api/v1/billing/webhook
///
/// Verifies the provider signature over the raw body, decodes the event, and
/// hands it to the reconciler. Every decoded outcome is acknowledged with
/// 200 so the provider stops redelivering; only signature failures (400) and
/// store errors (500, so the provider retries) are surfaced. The reconciler
/// is idempotent under that retry.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::SignatureVerification)?;

    webhook::verify_signature(&body, signature, &state.config.stripe_webhook_secret)?;

    let envelope: EventEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook payload: {e}")))?;

    let Some(event) = webhook::decode_event(&envelope) else {
        debug!(event_id = %envelope.id, event_type = %envelope.event_type, "unhandled webhook event acknowledged");
        return Ok(StatusCode::OK);
    };

    match reconciler::apply_event(&state.db, &state.plans, &event).await? {
        Outcome::Applied => {
            info!(event_id = %envelope.id, event_type = %envelope.event_type, "entitlement updated")
        }
        Outcome::AlreadyBound => {
            debug!(event_id = %envelope.id, "customer already bound; redelivery ignored")
        }
        Outcome::NoMatch => {
            warn!(event_id = %envelope.id, event_type = %envelope.event_type, "no user matches webhook event; dropped")
        }
        Outcome::Stale => {
            debug!(event_id = %envelope.id, "stale webhook event ignored")
        }
        Outcome::ForeignPrice => {
            warn!(event_id = %envelope.id, "webhook price id not in plan table; dropped")
        }
    }

    Ok(StatusCode::OK)
}
