mod auth;
mod billing;
mod config;
mod db;
mod errors;
mod generation;
mod jobs;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::plans::PlanTable;
use crate::billing::stripe_client::StripeClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::JobsClient;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobMate API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (session store)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let timeout = Duration::from_secs(config.http_timeout_secs);

    // Outbound provider clients, all timeout-bound
    let llm = LlmClient::new(config.anthropic_api_key.clone(), timeout);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let stripe = StripeClient::new(config.stripe_secret_key.clone(), timeout);
    info!("Stripe client initialized");

    let jobs = JobsClient::new(
        config.jobs_api_url.clone(),
        config.jobs_api_key.clone(),
        timeout,
    );

    // Static plan table (price ids from config, limits owned here)
    let plans = PlanTable::from_config(&config);

    // Build app state
    let state = AppState {
        db,
        redis,
        llm,
        stripe,
        jobs,
        plans,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
