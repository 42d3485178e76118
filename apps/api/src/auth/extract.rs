//! `AuthUser` extractor: resolves the session token to a full user row, or
//! rejects with 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

pub struct AuthUser(pub User);

/// Reads the session token from `Authorization: Bearer <token>` or, as a
/// fallback, a `session=<token>` cookie.
fn session_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    parts
        .headers
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|c| {
                c.trim()
                    .strip_prefix("session=")
                    .map(|token| token.to_string())
            })
        })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(AppError::Unauthenticated)?;

        let user_id = session::user_id(&state.redis, &token)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser(user))
    }
}
