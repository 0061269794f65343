//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;
use crate::models::lifecycle::InvalidTransition;
use crate::repositories::RepositoryError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Persistence Errors**: Repository failures (database, conflicts)
/// - **Resource Errors**: Requested listing, subscription or key not found
/// - **Lifecycle Errors**: Transitions the listing state machine does not allow
/// - **Gateway Errors**: Fail-closed operations whose gateway call failed
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Persistence layer failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Returns HTTP 404 Not Found.
    #[error("API not found")]
    ApiNotFound,

    /// Returns HTTP 404 Not Found.
    #[error("Subscription not found")]
    SubscriptionNotFound,

    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    KeyNotFound,

    /// The listing is not in a state that allows the requested action.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),

    /// A gateway call that the operation depends on failed.
    ///
    /// Returns HTTP 502 Bad Gateway (503 when the gateway is known to be down).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `ApiNotFound` / `SubscriptionNotFound` / `KeyNotFound` → 404 Not Found
/// - `InvalidRequest` → 400 Bad Request
/// - `InvalidTransition` / repository `Conflict` → 409 Conflict
/// - `Gateway` → 502 Bad Gateway, or 503 for `GatewayError::Unavailable`
/// - repository `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::ApiNotFound => (StatusCode::NOT_FOUND, "api_not_found", self.to_string()),
            AppError::SubscriptionNotFound => (
                StatusCode::NOT_FOUND,
                "subscription_not_found",
                self.to_string(),
            ),
            AppError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found", self.to_string()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvalidTransition(_) => {
                (StatusCode::CONFLICT, "invalid_transition", self.to_string())
            }
            AppError::Gateway(GatewayError::Unavailable) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "gateway_unavailable",
                self.to_string(),
            ),
            AppError::Gateway(ref e) => {
                tracing::error!(error = %e, "gateway operation failed");
                (StatusCode::BAD_GATEWAY, "gateway_error", self.to_string())
            }
            AppError::Repository(RepositoryError::NotFound(ref what)) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            AppError::Repository(RepositoryError::Conflict(ref msg)) => {
                (StatusCode::CONFLICT, "conflict", msg.clone())
            }
            AppError::Repository(RepositoryError::Database(ref e)) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
