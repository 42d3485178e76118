//! Usage metering: decides whether a generation is permitted and charges
//! quota after one succeeds.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;

/// Whether the user may perform a generation action.
///
/// A paid user always passes. Otherwise the limit/count pair decides, with a
/// NULL limit meaning unlimited — the rule is symmetric over the two fields,
/// `has_paid` is an additional unconditional bypass.
pub fn can_generate(user: &User) -> bool {
    user.has_paid
        || user
            .generation_limit
            .map_or(true, |limit| user.generation_count < limit)
}

#[derive(Debug, serde::Serialize)]
pub struct UsageSnapshot {
    pub generation_limit: Option<i32>,
    pub generation_count: i32,
}

/// Charges one generation against the user's quota.
///
/// The increment is a single conditional UPDATE so concurrent generations
/// (multiple open tabs) cannot push the count past the limit via lost
/// updates. Call only after the generation gateway has succeeded — a failed
/// generation never consumes quota.
pub async fn record_generation(pool: &PgPool, user_id: Uuid) -> Result<UsageSnapshot, AppError> {
    let updated: Option<(Option<i32>, i32)> = sqlx::query_as(
        r#"
        UPDATE users
        SET generation_count = generation_count + 1
        WHERE id = $1
          AND (has_paid OR generation_limit IS NULL OR generation_count < generation_limit)
        RETURNING generation_limit, generation_count
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some((generation_limit, generation_count)) => Ok(UsageSnapshot {
            generation_limit,
            generation_count,
        }),
        None => {
            // Either the user vanished or the gate closed between check and
            // act (concurrent generation or a webhook downgrade).
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
            if exists.is_some() {
                Err(AppError::QuotaExceeded)
            } else {
                Err(AppError::NotFound(format!("User {user_id} not found")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(has_paid: bool, limit: Option<i32>, count: i32) -> User {
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: String::new(),
            stripe_customer_id: None,
            subscription_status: if has_paid { "active" } else { "none" }.into(),
            has_paid,
            generation_limit: limit,
            generation_count: count,
            billing_event_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_paid_user_always_allowed() {
        assert!(can_generate(&user(true, Some(10), 10)));
        assert!(can_generate(&user(true, Some(0), 9999)));
        assert!(can_generate(&user(true, None, 0)));
    }

    #[test]
    fn test_free_user_under_limit_allowed() {
        assert!(can_generate(&user(false, Some(6), 0)));
        assert!(can_generate(&user(false, Some(6), 5)));
    }

    #[test]
    fn test_free_user_at_limit_blocked() {
        assert!(!can_generate(&user(false, Some(6), 6)));
        assert!(!can_generate(&user(false, Some(6), 7)));
    }

    #[test]
    fn test_null_limit_means_unlimited() {
        assert!(can_generate(&user(false, None, 1_000_000)));
    }

    #[test]
    fn test_monotonically_falsified_as_count_grows() {
        // Once the gate closes it stays closed for every higher count.
        let limit = 4;
        let mut blocked_seen = false;
        for count in 0..10 {
            let allowed = can_generate(&user(false, Some(limit), count));
            if blocked_seen {
                assert!(!allowed, "gate reopened at count {count}");
            }
            if !allowed {
                blocked_seen = true;
                assert!(count >= limit);
            }
        }
        assert!(blocked_seen);
    }
}
