//! Automation API Handlers
//!
//! HTTP endpoints for launching automation jobs and inspecting them.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use deskpilot_core::domain::job::Job;
use deskpilot_core::dto::automation::{RunAutomation, RunAutomationResponse};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /run-automation
/// Provision a job and return once its desktop is reachable (or the wait gave up)
pub async fn run_automation(
    State(state): State<AppState>,
    body: Result<Json<RunAutomation>, JsonRejection>,
) -> ApiResult<Json<RunAutomationResponse>> {
    let Json(req) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    tracing::info!(
        "Automation requested: client={:?} frequency={:?} batch={:?}",
        req.client_id,
        req.frequency,
        req.batch_id
    );

    let response = state.lifecycle.run(req).await?;
    Ok(Json(response))
}

/// GET /jobs
/// List every job known to this process, newest first
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    tracing::debug!("Listing jobs");
    Json(state.lifecycle.tracker().list())
}

/// GET /job/{deployment_name}
pub async fn get_job(
    State(state): State<AppState>,
    Path(deployment_name): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", deployment_name);

    state
        .lifecycle
        .tracker()
        .get(&deployment_name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", deployment_name)))
}
