//! REST surface over the pipeline. Thin: handlers validate input, call one
//! pipeline operation, and map the result to a JSON envelope. Internal error
//! detail is logged, never returned.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use gigwire_common::{RawEventRecord, SourceType};
use gigwire_pipeline::PipelineError;

use crate::AppState;

fn error_response(e: &PipelineError) -> Response {
    match e {
        PipelineError::BatchNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Intake batch {id} not found")})),
        )
            .into_response(),
        other => {
            error!(error = %other, "Pipeline operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal pipeline error"})),
            )
                .into_response()
        }
    }
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "gigwire-api",
        "description": "Event ingestion and write-audit-publish workflows",
        "endpoints": {
            "health": "GET /api/v1/health",
            "metrics": "GET /api/v1/metrics",
            "mock_scraper": "POST /api/v1/scrapers/mock/run",
            "process_intake": "POST /api/v1/scrapers/process-intake",
            "submissions": "POST /api/v1/submissions",
            "wap_audit": "POST /api/v1/wap/audit",
            "wap_publish": "POST /api/v1/wap/publish",
            "scheduler_jobs": "GET /api/v1/scheduler/jobs",
        },
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => "connected",
        Err(e) => {
            error!(error = %e, "Health check database probe failed");
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "service": "gigwire-api",
        "database": database,
        "scheduler": if state.scheduler_enabled { "enabled" } else { "disabled" },
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.metrics().await {
        Ok(metrics) => Json(json!({"status": "success", "metrics": metrics})).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct MockRunRequest {
    #[serde(default = "default_mock_count")]
    pub count: usize,
    #[serde(default)]
    pub include_bad_events: bool,
}

fn default_mock_count() -> usize {
    10
}

/// Generate mock events, append them to intake, and promote to staging.
pub async fn run_mock_scraper(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MockRunRequest>,
) -> Response {
    let mut events = gigwire_scraper::generate_events(body.count);
    if body.include_bad_events {
        events.extend(gigwire_scraper::bad_event_fixtures(Utc::now().date_naive()));
    }
    let generated = events.len();

    let payload = match serde_json::to_value(&events) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to serialize generated events");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
                .into_response();
        }
    };

    let batch_id = match state
        .pipeline
        .intake
        .append(
            gigwire_scraper::SOURCE_NAME,
            payload,
            Some(gigwire_scraper::SOURCE_VERSION),
        )
        .await
    {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .pipeline
        .transformer
        .promote(batch_id, SourceType::Scraper)
        .await
    {
        Ok(outcome) => Json(json!({
            "status": "success",
            "intake_id": batch_id,
            "events_generated": generated,
            "events_processed": outcome.records_processed,
            "new_events": outcome.records_created,
            "updated_events": outcome.records_updated(),
            "failed_records": outcome.records_failed,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct ProcessIntakeRequest {
    pub intake_id: i64,
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
}

fn default_source_type() -> SourceType {
    SourceType::Scraper
}

/// Re-promote an existing intake batch (replay path).
pub async fn process_intake(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessIntakeRequest>,
) -> Response {
    match state
        .pipeline
        .transformer
        .promote(body.intake_id, body.source_type)
        .await
    {
        Ok(outcome) => Json(json!({
            "status": "success",
            "intake_id": body.intake_id,
            "events_processed": outcome.records_processed,
            "new_events": outcome.records_created,
            "updated_events": outcome.records_updated(),
            "failed_records": outcome.records_failed,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Accept one user-submitted event: append to intake, then promote.
pub async fn submit_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    // Validate the document shape up front so the caller gets a 422 instead
    // of a silently-skipped record.
    if let Err(e) = serde_json::from_value::<RawEventRecord>(body.clone()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": format!("Invalid event document: {e}")})),
        )
            .into_response();
    }

    let batch_id = match state
        .pipeline
        .intake
        .append("user_submission", json!([body]), None)
        .await
    {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .pipeline
        .transformer
        .promote(batch_id, SourceType::UserSubmission)
        .await
    {
        Ok(outcome) => Json(json!({
            "status": "success",
            "intake_id": batch_id,
            "created": outcome.records_created == 1,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Ad hoc audit run — quarantines violators without publishing.
pub async fn wap_audit(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.auditor.run(Utc::now()).await {
        Ok(finding) => Json(json!({
            "status": if finding.passed() { "success" } else { "failed" },
            "error_count": finding.error_count,
            "quarantined_count": finding.quarantined_count,
            "requalified_count": finding.requalified_count,
            "error_summary": finding.summary,
            "audit_passed": finding.passed(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

fn default_batch_size() -> i64 {
    500
}

/// Full write-audit-publish run.
pub async fn wap_publish(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PublishRequest>,
) -> Response {
    match state
        .pipeline
        .publisher
        .auto_publish(body.batch_size, Utc::now())
        .await
    {
        Ok(outcome) => Json(json!({
            "status": outcome.status,
            "error_count": outcome.error_count,
            "quarantined_count": outcome.quarantined_count,
            "published_count": outcome.published_count,
            "message": outcome.message,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn scheduler_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({"status": "success", "jobs": state.jobs}))
}
