//! Webhook reconciler: maps provider subscription events to entitlement
//! mutations on the user row.
//!
//! The event feed is at-least-once and possibly out of order. Every
//! transition here is a single conditional UPDATE so that redelivery is
//! idempotent and a stale event (older `created` than the last applied one)
//! cannot regress entitlement state.

use sqlx::PgPool;
use tracing::debug;

use crate::billing::plans::PlanTable;
use crate::billing::webhook::SubscriptionEvent;
use crate::errors::AppError;

/// Local subscription lifecycle states, mirroring the provider's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    None,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Collapses the provider's richer status set onto ours. Trialing counts
    /// as active for entitlement; anything unrecognized is treated as
    /// canceled so an unknown state never grants access.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" | "trialing" => SubscriptionStatus::Active,
            "past_due" | "unpaid" | "incomplete" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        }
    }
}

/// The absolute entitlement state a subscription event resolves to.
/// Absolute (not a delta), so applying the same patch twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub subscription_status: SubscriptionStatus,
    pub has_paid: bool,
    pub generation_limit: Option<i32>,
    pub generation_count: i32,
    pub billing_event_at: i64,
}

/// Transition for subscription-created / subscription-updated: adopt the
/// event's status, resolve the plan limit, and zero usage so a plan change
/// never carries partial usage under a different cap.
pub fn plan_patch(provider_status: &str, generation_limit: Option<i32>, created: i64) -> EntitlementPatch {
    let status = SubscriptionStatus::from_provider(provider_status);
    EntitlementPatch {
        subscription_status: status,
        has_paid: status == SubscriptionStatus::Active,
        generation_limit,
        generation_count: 0,
        billing_event_at: created,
    }
}

/// Transition for subscription-deleted: zero everything.
pub fn cancel_patch(created: i64) -> EntitlementPatch {
    EntitlementPatch {
        subscription_status: SubscriptionStatus::Canceled,
        has_paid: false,
        generation_limit: Some(0),
        generation_count: 0,
        billing_event_at: created,
    }
}

/// An event is stale when a strictly newer event has already been applied.
/// Equal timestamps re-apply; the patch is absolute, so that is harmless and
/// keeps redelivery of the newest event idempotent.
pub fn is_stale(applied_at: Option<i64>, event_created: i64) -> bool {
    applied_at.map_or(false, |t| t > event_created)
}

/// What the reconciler did with an event. Only `Err` makes the webhook
/// handler fail; every outcome here is acknowledged to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// checkout-completed redelivered after the customer id was bound.
    AlreadyBound,
    /// No user matches the event's customer id or email; logged and dropped.
    NoMatch,
    /// A newer event was already applied; ignored.
    Stale,
    /// The event's price id is not in our plan table; ignored rather than
    /// zeroing a valid limit on foreign data.
    ForeignPrice,
}

pub async fn apply_event(
    pool: &PgPool,
    plans: &PlanTable,
    event: &SubscriptionEvent,
) -> Result<Outcome, AppError> {
    match event {
        SubscriptionEvent::CheckoutCompleted { customer_id, email } => {
            bind_customer(pool, customer_id, email).await
        }
        SubscriptionEvent::SubscriptionChanged {
            customer_id,
            status,
            price_id,
            created,
        } => {
            let Some(plan) = plans.by_price_id(price_id) else {
                return Ok(Outcome::ForeignPrice);
            };
            let patch = plan_patch(status, plan.generation_limit, *created);
            apply_patch(pool, customer_id, &patch).await
        }
        SubscriptionEvent::SubscriptionDeleted {
            customer_id,
            created,
        } => apply_patch(pool, customer_id, &cancel_patch(*created)).await,
    }
}

/// Binds email → customer id, only where no binding exists yet. The customer
/// id is immutable for the user's lifetime, so redelivery is a no-op.
async fn bind_customer(
    pool: &PgPool,
    customer_id: &str,
    email: &str,
) -> Result<Outcome, AppError> {
    let rows = sqlx::query(
        "UPDATE users SET stripe_customer_id = $1 WHERE email = $2 AND stripe_customer_id IS NULL",
    )
    .bind(customer_id)
    .bind(email.to_lowercase())
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 1 {
        return Ok(Outcome::Applied);
    }

    let existing: Option<(Option<String>,)> =
        sqlx::query_as("SELECT stripe_customer_id FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(pool)
            .await?;

    match existing {
        Some((Some(_),)) => Ok(Outcome::AlreadyBound),
        _ => Ok(Outcome::NoMatch),
    }
}

/// Writes an absolute entitlement patch, guarded against stale events. All
/// five fields land in one statement so no concurrent reader can observe
/// `has_paid` inconsistent with `subscription_status`.
async fn apply_patch(
    pool: &PgPool,
    customer_id: &str,
    patch: &EntitlementPatch,
) -> Result<Outcome, AppError> {
    let rows = sqlx::query(
        r#"
        UPDATE users
        SET subscription_status = $1,
            has_paid = $2,
            generation_limit = $3,
            generation_count = $4,
            billing_event_at = $5
        WHERE stripe_customer_id = $6
          AND (billing_event_at IS NULL OR billing_event_at <= $5)
        "#,
    )
    .bind(patch.subscription_status.as_str())
    .bind(patch.has_paid)
    .bind(patch.generation_limit)
    .bind(patch.generation_count)
    .bind(patch.billing_event_at)
    .bind(customer_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 1 {
        return Ok(Outcome::Applied);
    }

    let exists: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM users WHERE stripe_customer_id = $1")
            .bind(customer_id)
            .fetch_optional(pool)
            .await?;

    if exists.is_some() {
        debug!(customer_id, event_at = patch.billing_event_at, "stale subscription event ignored");
        Ok(Outcome::Stale)
    } else {
        Ok(Outcome::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mirror of the SQL application, for exercising transition semantics on
    // an in-memory entitlement tuple.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Entitlement {
        status: SubscriptionStatus,
        has_paid: bool,
        limit: Option<i32>,
        count: i32,
        event_at: Option<i64>,
    }

    impl Entitlement {
        fn apply(&mut self, patch: &EntitlementPatch) {
            if is_stale(self.event_at, patch.billing_event_at) {
                return;
            }
            self.status = patch.subscription_status;
            self.has_paid = patch.has_paid;
            self.limit = patch.generation_limit;
            self.count = patch.generation_count;
            self.event_at = Some(patch.billing_event_at);
        }
    }

    fn free_user() -> Entitlement {
        Entitlement {
            status: SubscriptionStatus::None,
            has_paid: false,
            limit: Some(6),
            count: 3,
            event_at: None,
        }
    }

    #[test]
    fn test_activation_sets_paid_and_resets_count() {
        let mut e = free_user();
        e.apply(&plan_patch("active", Some(500), 100));
        assert_eq!(e.status, SubscriptionStatus::Active);
        assert!(e.has_paid);
        assert_eq!(e.limit, Some(500));
        assert_eq!(e.count, 0);
        assert_eq!(e.event_at, Some(100));
    }

    #[test]
    fn test_idempotent_under_redelivery() {
        let mut once = free_user();
        once.apply(&plan_patch("active", Some(500), 100));
        let mut twice = once.clone();
        twice.apply(&plan_patch("active", Some(500), 100));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_downgrade_resets_usage() {
        let mut e = Entitlement {
            status: SubscriptionStatus::Active,
            has_paid: true,
            limit: Some(100),
            count: 80,
            event_at: Some(100),
        };
        e.apply(&plan_patch("active", Some(100), 200));
        assert_eq!(e.count, 0);
        assert_eq!(e.limit, Some(100));
    }

    #[test]
    fn test_cancellation_zeroes_entitlement() {
        let mut e = Entitlement {
            status: SubscriptionStatus::Active,
            has_paid: true,
            limit: None,
            count: 42,
            event_at: Some(100),
        };
        e.apply(&cancel_patch(200));
        assert_eq!(e.status, SubscriptionStatus::Canceled);
        assert!(!e.has_paid);
        assert_eq!(e.limit, Some(0));
        assert_eq!(e.count, 0);
    }

    #[test]
    fn test_stale_event_does_not_regress() {
        let mut e = free_user();
        e.apply(&plan_patch("active", Some(500), 200));
        // Redelivered older event: a past_due update from before the upgrade.
        e.apply(&plan_patch("past_due", Some(100), 150));
        assert_eq!(e.status, SubscriptionStatus::Active);
        assert!(e.has_paid);
        assert_eq!(e.limit, Some(500));
    }

    #[test]
    fn test_past_due_clears_paid_flag() {
        let patch = plan_patch("past_due", Some(500), 100);
        assert_eq!(patch.subscription_status, SubscriptionStatus::PastDue);
        assert!(!patch.has_paid);
    }

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider("unpaid"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_provider("something_new"),
            SubscriptionStatus::Canceled
        );
    }

    #[test]
    fn test_is_stale() {
        assert!(!is_stale(None, 100));
        assert!(!is_stale(Some(100), 100));
        assert!(!is_stale(Some(100), 200));
        assert!(is_stale(Some(200), 100));
    }
}
