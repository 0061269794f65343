//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

/// Health check response.
///
/// Returns service status, database connectivity and gateway reachability.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    /// Gateway liveness as seen by the probe ("reachable" / "unreachable")
    pub gateway: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Database connectivity (executes simple query)
/// - Gateway `/health` (a down gateway degrades the status but is not an error)
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "gateway": "reachable",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If database is unreachable, returns standard error response.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.repos.apis.ping().await?;

    let gateway_up = state.health.is_healthy().await;

    Ok(Json(HealthResponse {
        status: if gateway_up { "healthy" } else { "degraded" }.to_string(),
        database: "connected".to_string(),
        gateway: if gateway_up { "reachable" } else { "unreachable" }.to_string(),
        timestamp: Utc::now(),
    }))
}
