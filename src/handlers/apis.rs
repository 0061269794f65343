//! API listing HTTP handlers.
//!
//! This module implements the listing lifecycle endpoints:
//! - POST /api/v1/apis - Register a listing (pending approval)
//! - GET /api/v1/apis/{uid} - Get a listing
//! - PUT /api/v1/apis/{uid} - Edit a listing
//! - DELETE /api/v1/apis/{uid} - Delete a listing
//! - POST /api/v1/apis/{uid}/approve - Publish a listing on the gateway
//! - POST /api/v1/apis/{uid}/deactivate - Take a listing off the gateway

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api::{ApiResponse, CreateApiRequest, UpdateApiRequest},
        sync::SyncedResponse,
    },
    state::AppState,
};

/// Register a new API listing.
///
/// # Endpoint
///
/// `POST /api/v1/apis`
///
/// # Request Body
///
/// ```json
/// {
///   "seller_id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Weather",
///   "endpoint": "/v1/forecast",
///   "base_url": "https://weather.example.com",
///   "methods": ["GET"]
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the listing, in `pending` state
/// - **Error (400)**: empty name, no usable methods or an unparseable upstream URL
///
/// Nothing is sent to the gateway until the listing is approved.
pub async fn create_api(
    State(state): State<AppState>,
    Json(request): Json<CreateApiRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let listing = state.lifecycle.create_api(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(listing, &state.public_gateway_url)),
    ))
}

/// Get a listing by uid.
///
/// # Response
///
/// - **Success (200 OK)**: the listing, including its public `gateway_url`
/// - **Error (404)**: no listing with that uid
pub async fn get_api(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
) -> Result<Json<ApiResponse>, AppError> {
    let listing = state.lifecycle.get_api(uid).await?;

    Ok(Json(ApiResponse::new(listing, &state.public_gateway_url)))
}

/// Edit a listing. Absent fields are left unchanged.
///
/// # Endpoint
///
/// `PUT /api/v1/apis/{uid}`
///
/// # Gateway Sync
///
/// If the listing is active and its routing changed (endpoint, base URL, methods or
/// required headers), the route is updated on the gateway. The edit is kept even if that
/// fails; `gateway_sync` in the response says what happened:
///
/// ```json
/// {
///   "uid": "0b0f3c2e-6a0d-4c4e-9d7f-0d7c2c1f9a11",
///   "endpoint": "/v2/forecast",
///   "gateway_sync": { "status": "failed", "error": "gateway update failed: ..." }
/// }
/// ```
pub async fn update_api(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
    Json(request): Json<UpdateApiRequest>,
) -> Result<Json<SyncedResponse<ApiResponse>>, AppError> {
    let synced = state.lifecycle.update_api(uid, request).await?;
    let url = state.public_gateway_url.clone();

    Ok(Json(
        synced.map(|listing| ApiResponse::new(listing, &url)).into(),
    ))
}

/// Approve a listing and publish it on the gateway.
///
/// # Endpoint
///
/// `POST /api/v1/apis/{uid}/approve`
///
/// # Response
///
/// - **Success (200 OK)**: the listing, now `active`
/// - **Error (409)**: the listing is already active, or changed state concurrently
/// - **Error (502)**: the gateway refused or could not be reached; the listing is unchanged
/// - **Error (503)**: fast-fail is on and the gateway is known to be down
pub async fn approve_api(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
) -> Result<Json<ApiResponse>, AppError> {
    let listing = state.lifecycle.approve_api(uid).await?;

    Ok(Json(ApiResponse::new(listing, &state.public_gateway_url)))
}

/// Deactivate a listing.
///
/// The listing becomes `inactive` even if the route could not be removed from the gateway.
pub async fn deactivate_api(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
) -> Result<Json<SyncedResponse<ApiResponse>>, AppError> {
    let synced = state.lifecycle.deactivate_api(uid).await?;
    let url = state.public_gateway_url.clone();

    Ok(Json(
        synced.map(|listing| ApiResponse::new(listing, &url)).into(),
    ))
}

/// Delete a listing with its subscriptions and keys.
///
/// # Response
///
/// - **Success (200 OK)**: `{"deleted": true, "gateway_sync": {...}}`
/// - **Error (404)**: no listing with that uid
pub async fn delete_api(
    State(state): State<AppState>,
    Path(uid): Path<Uuid>,
) -> Result<Json<SyncedResponse<DeletedResponse>>, AppError> {
    let synced = state.lifecycle.delete_api(uid).await?;

    Ok(Json(synced.map(|()| DeletedResponse { deleted: true }).into()))
}

#[derive(Debug, serde::Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}
