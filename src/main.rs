mod db;
mod domain;
mod jobs;
mod middleware;
mod services;
mod state;
mod web;

use crate::db::seed;
use crate::middleware::RateLimiter;
use crate::state::{AppState, SharedState};
use base64::{engine::general_purpose, Engine as _};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL missing");
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    seed::seed_admin(&pool).await?;

    let session_key_b64 = std::env::var("SESSION_KEY").expect("SESSION_KEY missing");
    let session_key = general_purpose::STANDARD
        .decode(session_key_b64)
        .expect("SESSION_KEY must be base64");
    let webhook_secret = std::env::var("PAYMENTS_WEBHOOK_SECRET")
        .expect("PAYMENTS_WEBHOOK_SECRET missing")
        .into_bytes();

    let (rollup_tx, rollup_rx) = tokio::sync::mpsc::unbounded_channel();

    let shared: SharedState = Arc::new(AppState {
        pool,
        cache: Arc::new(services::cache::CacheClient::from_env()?),
        storage: Arc::new(services::storage::Storage::from_env()?),
        transcriber: Arc::new(services::transcriber::Transcriber::from_env()?),
        mailer: Arc::new(services::mailer::Mailer::from_env()?),
        gateway: Arc::new(services::payments::GatewayClient::from_env()?),
        embeddings: Arc::new(services::embeddings::Embeddings::from_env()),
        session_key,
        webhook_secret,
        rollup_tx,
        login_limiter: RateLimiter::new(5, 60),
        submit_limiter: RateLimiter::new(10, 60),
    });

    jobs::rollup::spawn_worker(shared.clone(), rollup_rx);

    let scheduler = JobScheduler::new().await?;

    // Hourly: heal question bank cache projections from Postgres.
    let shared_for_backfill = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_backfill.clone();
            Box::pin(async move {
                match jobs::backfill::refresh_question_projections(&state).await {
                    Ok(n) => tracing::debug!("Question projection backfill touched {} banks", n),
                    Err(e) => tracing::error!("Question projection backfill failed: {}", e),
                }
            })
        })?)
        .await?;

    // Hourly: drop stale rate limiter windows.
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 30 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.login_limiter.cleanup().await;
                state.submit_limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: projection backfill and limiter cleanup hourly");

    let app = web::routes(shared)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{}", port)
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
