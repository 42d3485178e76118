//! Checkout orchestration: ensure a provider customer exists, cancel any
//! prior active subscription, create a checkout session for the chosen plan.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::billing::plans::PlanKey;
use crate::billing::stripe_client::StripeClient;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

const CANCEL_ATTEMPTS: u32 = 3;

/// Starts a checkout for the given plan and returns the provider's redirect
/// URL. The caller is already authenticated.
pub async fn start_checkout(
    state: &AppState,
    user: &User,
    plan_key: PlanKey,
) -> Result<String, AppError> {
    let plan = state.plans.by_key(plan_key);

    let customer_id = ensure_customer(&state.db, &state.stripe, user).await?;

    // At most one active subscription per customer: cancel survivors before
    // creating a new session, and surface failure rather than proceed.
    cancel_active_subscriptions(&state.stripe, &customer_id).await?;

    let session = state
        .stripe
        .create_checkout_session(
            &customer_id,
            &plan.price_id,
            &state.config.checkout_success_url,
            &state.config.checkout_cancel_url,
        )
        .await?;

    info!(user_id = %user.id, plan = plan_key.as_str(), session_id = %session.id, "checkout session created");
    Ok(session.url)
}

/// Returns the user's provider customer id, creating and binding one if none
/// exists. The bind is a conditional UPDATE; if a concurrent request won the
/// race we re-read and use the winner's id, so exactly one customer ever
/// sticks to a user.
async fn ensure_customer(
    pool: &PgPool,
    stripe: &StripeClient,
    user: &User,
) -> Result<String, AppError> {
    if let Some(id) = &user.stripe_customer_id {
        return Ok(id.clone());
    }

    let customer = stripe.create_customer(&user.email).await?;

    let rows = sqlx::query(
        "UPDATE users SET stripe_customer_id = $1 WHERE id = $2 AND stripe_customer_id IS NULL",
    )
    .bind(&customer.id)
    .bind(user.id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 1 {
        info!(user_id = %user.id, customer_id = %customer.id, "provider customer bound");
        return Ok(customer.id);
    }

    // Lost the race: another request (or the checkout-completed webhook)
    // bound a customer first. Our freshly created customer is orphaned at
    // the provider; the winner's id is authoritative.
    let (winner,): (Option<String>,) =
        sqlx::query_as("SELECT stripe_customer_id FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;

    winner.ok_or_else(|| {
        anyhow::anyhow!("customer bind race resolved to no customer id").into()
    })
}

/// Cancels every active subscription for the customer, retrying each with
/// exponential backoff. A cancellation that still fails after the last
/// attempt aborts the checkout.
async fn cancel_active_subscriptions(
    stripe: &StripeClient,
    customer_id: &str,
) -> Result<(), AppError> {
    let active = stripe.list_active_subscriptions(customer_id).await?;

    for sub in active {
        let mut last_err = None;
        for attempt in 0..CANCEL_ATTEMPTS {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(subscription_id = %sub.id, attempt, "retrying subscription cancellation after {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
            match stripe.cancel_subscription(&sub.id).await {
                Ok(()) => {
                    info!(subscription_id = %sub.id, customer_id, "canceled prior active subscription");
                    last_err = None;
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        if let Some(e) = last_err {
            return Err(e.into());
        }
    }

    Ok(())
}
