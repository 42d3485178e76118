use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{password, session};
use crate::billing::plans::FREE_GENERATION_LIMIT;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: Uuid,
}

/// POST /api/v1/auth/register
///
/// Creates an account with the free entitlement (status `none`, limit 6)
/// and opens a session.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, subscription_status, generation_limit)
        VALUES ($1, $2, $3, 'none', $4)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(FREE_GENERATION_LIMIT)
    .execute(&state.db)
    .await;

    if let Err(sqlx::Error::Database(db_err)) = &result {
        if db_err.is_unique_violation() {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }
    }
    result?;

    let token = session::create(&state.redis, user_id).await?;
    info!(%user_id, "user registered");

    Ok((StatusCode::CREATED, Json(SessionResponse { token, user_id })))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !password::verify_password(&user.password_hash, &req.password)? {
        return Err(AppError::Unauthenticated);
    }

    let token = session::create(&state.redis, user.id).await?;

    Ok(Json(SessionResponse {
        token,
        user_id: user.id,
    }))
}

/// POST /api/v1/auth/logout
///
/// Destroys the presented session. Idempotent.
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    session::destroy(&state.redis, token.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}
