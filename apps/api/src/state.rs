use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::billing::plans::PlanTable;
use crate::billing::stripe_client::StripeClient;
use crate::config::Config;
use crate::jobs::JobsClient;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Session token storage.
    pub redis: RedisClient,
    pub llm: LlmClient,
    pub stripe: StripeClient,
    pub jobs: JobsClient,
    /// Static plan table: PlanKey ↔ provider price id ↔ generation limit.
    pub plans: PlanTable,
    pub config: Config,
}
