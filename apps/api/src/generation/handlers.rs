//! Axum route handlers for the Generation API.
//!
//! The metering gate runs before the LLM call; quota is charged only after
//! the call succeeds, so a failed generation never consumes quota.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::extract::AuthUser;
use crate::billing::metering::{can_generate, record_generation};
use crate::errors::AppError;
use crate::generation::prompts;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Resume,
    CoverLetter,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub kind: GenerationKind,
    pub job_description: String,
    /// Free-form candidate background pasted by the user.
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub generation_limit: Option<i32>,
    pub generation_count: i32,
}

/// POST /api/v1/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    if !can_generate(&user) {
        return Err(AppError::QuotaExceeded);
    }

    let system = prompts::system_prompt(request.kind);
    let prompt = prompts::build_prompt(
        request.kind,
        &request.job_description,
        request.context.as_deref(),
    );

    let response = state
        .llm
        .call(&prompt, system)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let text = response
        .text()
        .ok_or_else(|| AppError::Upstream("LLM returned empty content".to_string()))?
        .to_string();

    // Charge quota only now that the gateway call succeeded.
    let usage = record_generation(&state.db, user.id).await?;

    Ok(Json(GenerateResponse {
        text,
        generation_limit: usage.generation_limit,
        generation_count: usage.generation_count,
    }))
}
