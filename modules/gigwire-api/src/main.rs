use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gigwire_common::Config;
use gigwire_pipeline::{AuditPolicy, Pipeline};

mod rest;
mod scheduler;

use scheduler::{JobDescriptor, PipelineScheduler};

pub struct AppState {
    pub pipeline: Pipeline,
    pub pool: sqlx::PgPool,
    pub jobs: Vec<JobDescriptor>,
    pub scheduler_enabled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting gigwire-api");

    // Missing required config fails fast here, before anything binds.
    let config = Config::from_env();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    gigwire_pipeline::run_migrations(&pool).await?;
    info!("Migrations applied");

    let policy = AuditPolicy {
        horizon_days: config.audit_horizon_days,
    };
    let pipeline = Pipeline::new(pool.clone(), policy);

    let mut scheduler = PipelineScheduler::new(pipeline.clone(), config.clone());
    if config.enable_scheduler {
        scheduler.start();
    } else {
        info!("Scheduler disabled (ENABLE_SCHEDULER=false)");
    }

    let state = Arc::new(AppState {
        pipeline,
        pool,
        jobs: scheduler.jobs(),
        scheduler_enabled: config.enable_scheduler,
    });

    let app = Router::new()
        .route("/", get(rest::root))
        .route("/api/v1/health", get(rest::health))
        .route("/api/v1/metrics", get(rest::metrics))
        .route("/api/v1/scrapers/mock/run", post(rest::run_mock_scraper))
        .route("/api/v1/scrapers/process-intake", post(rest::process_intake))
        .route("/api/v1/submissions", post(rest::submit_event))
        .route("/api/v1/wap/audit", post(rest::wap_audit))
        .route("/api/v1/wap/publish", post(rest::wap_publish))
        .route("/api/v1/scheduler/jobs", get(rest::scheduler_jobs))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("gigwire-api stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
