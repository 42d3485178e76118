use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user row: identity plus the entitlement aggregate.
///
/// Entitlement fields (`subscription_status`, `has_paid`, `generation_limit`,
/// `generation_count`, `billing_event_at`) are only ever mutated through the
/// conditional UPDATE statements in `billing::reconciler` and
/// `billing::metering` — never via read-modify-write at the handler layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Payment-provider customer id. Bound lazily on first checkout or by the
    /// checkout-completed webhook, then never rotated.
    pub stripe_customer_id: Option<String>,
    /// One of `none | active | past_due | canceled`.
    pub subscription_status: String,
    /// Derived: true iff `subscription_status == "active"`. Always written in
    /// the same statement as the status.
    pub has_paid: bool,
    /// NULL means unlimited.
    pub generation_limit: Option<i32>,
    pub generation_count: i32,
    /// Provider timestamp of the last applied subscription event; the
    /// staleness guard against out-of-order webhook delivery.
    pub billing_event_at: Option<i64>,
    pub created_at: DateTime<Utc>,
}
