//! Operator endpoints.

use axum::{Json, extract::State};

use crate::{error::AppError, services::ReconcileReport, state::AppState};

/// Run one reconciliation pass now instead of waiting for the next tick.
///
/// # Endpoint
///
/// `POST /api/v1/admin/reconcile`
///
/// # Response (200 OK)
///
/// ```json
/// { "examined": 3, "resolved": 2, "failed": 1, "skipped": false }
/// ```
pub async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileReport>, AppError> {
    let report = state.reconciler.reconcile_pending().await?;

    Ok(Json(report))
}
