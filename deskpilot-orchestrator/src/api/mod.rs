//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod automation;
pub mod error;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::JobLifecycleManager;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<JobLifecycleManager>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Automation endpoints
        .route("/run-automation", post(automation::run_automation))
        .route("/jobs", get(automation::list_jobs))
        .route("/job/{deployment_name}", get(automation::get_job))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
