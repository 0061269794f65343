//! Gateway synchronization for an API marketplace.
//!
//! Sellers register HTTP APIs as listings. A listing moves through `pending → active →
//! inactive`, and every step is mirrored onto an external API gateway: approving publishes a
//! route, edits update it, keys follow their subscriptions and deactivation withdraws it.
//!
//! # Layers
//!
//! - [`handlers`]: axum endpoints under `/api/v1`
//! - [`services`]: lifecycle orchestration, key sync and drift reconciliation
//! - [`gateway`]: translation to the gateway's route model and its retrying admin client
//! - [`repositories`]: PostgreSQL (and in-memory) persistence

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

pub use state::{AppState, SyncOptions};

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Listing lifecycle
        .route("/api/v1/apis", post(handlers::apis::create_api))
        .route(
            "/api/v1/apis/{uid}",
            get(handlers::apis::get_api)
                .put(handlers::apis::update_api)
                .delete(handlers::apis::delete_api),
        )
        .route(
            "/api/v1/apis/{uid}/approve",
            post(handlers::apis::approve_api),
        )
        .route(
            "/api/v1/apis/{uid}/deactivate",
            post(handlers::apis::deactivate_api),
        )
        // Subscriptions and keys
        .route(
            "/api/v1/subscriptions",
            post(handlers::keys::create_subscription),
        )
        .route(
            "/api/v1/subscriptions/{id}/keys",
            post(handlers::keys::create_key),
        )
        .route(
            "/api/v1/keys/{id}/status",
            put(handlers::keys::set_key_status),
        )
        .route(
            "/api/v1/keys/{id}",
            delete(handlers::keys::delete_key),
        )
        // Operators
        .route(
            "/api/v1/admin/reconcile",
            post(handlers::admin::reconcile),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(api_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
