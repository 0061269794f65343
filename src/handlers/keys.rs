//! Subscription and API key HTTP handlers.
//!
//! - POST /api/v1/subscriptions - Subscribe a user to a listing
//! - POST /api/v1/subscriptions/{id}/keys - Issue a key
//! - PUT /api/v1/keys/{id}/status - Activate or revoke a key
//! - DELETE /api/v1/keys/{id} - Delete a key
//!
//! Key changes are mirrored to the gateway only while the listing is active, and never
//! fail because of the gateway; see `gateway_sync` in each response.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::apis::DeletedResponse,
    models::{
        api_key::{ApiKeyResponse, CreateKeyRequest, KeyStatusRequest},
        subscription::{CreateSubscriptionRequest, Subscription},
        sync::SyncedResponse,
    },
    state::AppState,
};

/// Subscribe a user to a listing.
///
/// # Request Body
///
/// ```json
/// { "api_uid": "0b0f3c2e-6a0d-4c4e-9d7f-0d7c2c1f9a11", "user_id": "..." }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the subscription
/// - **Error (404)**: unknown listing
/// - **Error (409)**: the user is already subscribed
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    let subscription = state.keys.create_subscription(request).await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Issue a key for a subscription.
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "...",
///   "subscription_id": "...",
///   "name": "production",
///   "key": "vk_5f2c...",
///   "is_active": true,
///   "expires_at": null,
///   "created_at": "2025-12-20T10:00:00Z",
///   "gateway_sync": { "status": "applied" }
/// }
/// ```
///
/// The `key` secret is only ever returned here.
pub async fn create_key(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<SyncedResponse<ApiKeyResponse>>), AppError> {
    let synced = state.keys.create_key(subscription_id, request).await?;
    let response = synced.map(|key| {
        let secret = key.key_value.clone();
        ApiKeyResponse::from(key).with_key(secret)
    });

    Ok((StatusCode::CREATED, Json(response.into())))
}

/// Activate or revoke a key.
///
/// # Request Body
///
/// ```json
/// { "is_active": false }
/// ```
pub async fn set_key_status(
    State(state): State<AppState>,
    Path(key_id): Path<Uuid>,
    Json(request): Json<KeyStatusRequest>,
) -> Result<Json<SyncedResponse<ApiKeyResponse>>, AppError> {
    let synced = state.keys.set_key_status(key_id, request.is_active).await?;

    Ok(Json(synced.map(ApiKeyResponse::from).into()))
}

/// Delete a key and withdraw it from the gateway.
///
/// # Response
///
/// ```json
/// { "deleted": true, "gateway_sync": { "status": "applied" } }
/// ```
///
/// An unknown key id returns 404.
pub async fn delete_key(
    State(state): State<AppState>,
    Path(key_id): Path<Uuid>,
) -> Result<Json<SyncedResponse<DeletedResponse>>, AppError> {
    let synced = state.keys.delete_key(key_id).await?;

    Ok(Json(synced.map(|()| DeletedResponse { deleted: true }).into()))
}
