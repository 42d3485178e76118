//! Thin proxy over the third-party jobs API. Query construction stays with
//! the caller; results pass through untouched. Not a metered action.

use axum::{
    extract::{Query, State},
    Json,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::extract::AuthUser;
use crate::errors::AppError;

#[derive(Clone)]
pub struct JobsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl JobsClient {
    pub fn new(base_url: String, api_key: String, timeout: std::time::Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        page: u32,
    ) -> Result<Value, AppError> {
        let mut request = self
            .client
            .get(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("query", query), ("page", &page.to_string())]);

        if let Some(location) = location {
            request = request.query(&[("location", location)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "jobs API returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct JobSearchQuery {
    pub q: String,
    pub location: Option<String>,
    pub page: Option<u32>,
}

/// GET /api/v1/jobs
pub async fn handle_search(
    State(state): State<crate::state::AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<JobSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("q cannot be empty".to_string()));
    }

    let results = state
        .jobs
        .search(&params.q, params.location.as_deref(), params.page.unwrap_or(1))
        .await?;

    Ok(Json(results))
}
