//! Route and key operations against the gateway.
//!
//! Each method translates its arguments with [`super::translator`], performs one
//! control-plane call and re-wraps failures as a [`GatewayError`] naming the operation.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::client::{ControlPlane, ControlPlaneError, GatewayResponse};
use super::translator::{
    AddKeysPayload, GatewayKey, KEY_STATUS_PATH, KEYS_PATH, KeyStatusPayload, ROUTES_PATH,
    RemoveKeyPayload, RouteConfig, route_path, route_resource,
};

/// Failure of a gateway operation, named after what was being attempted.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway registration failed: {0}")]
    Registration(#[source] ControlPlaneError),

    #[error("gateway update failed: {0}")]
    Update(#[source] ControlPlaneError),

    #[error("gateway unregistration failed: {0}")]
    Unregistration(#[source] ControlPlaneError),

    #[error("gateway key sync failed: {0}")]
    KeySync(#[source] ControlPlaneError),

    /// The health probe reported the gateway down, so no call was made.
    #[error("gateway is unavailable")]
    Unavailable,

    #[error("gateway payload could not be encoded: {0}")]
    Encoding(String),
}

impl GatewayError {
    /// Underlying control-plane failure, if any.
    pub fn cause(&self) -> Option<&ControlPlaneError> {
        match self {
            GatewayError::Registration(e)
            | GatewayError::Update(e)
            | GatewayError::Unregistration(e)
            | GatewayError::KeySync(e) => Some(e),
            GatewayError::Unavailable | GatewayError::Encoding(_) => None,
        }
    }

    /// Whether the gateway answered with the given HTTP status.
    pub fn has_status(&self, status: u16) -> bool {
        self.cause().and_then(ControlPlaneError::status) == Some(status)
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(payload).map_err(|e| GatewayError::Encoding(e.to_string()))
}

/// Whether the gateway echoed back a route other than the one sent.
///
/// Only the routing fields are compared. Keys may come back reordered or redacted.
fn echo_differs(sent: &RouteConfig, response: &GatewayResponse) -> bool {
    response.route().is_some_and(|echoed| {
        echoed.api_uid() != sent.api_uid()
            || echoed.upstream != sent.upstream
            || echoed.methods != sent.methods
    })
}

fn check_echo(sent: &RouteConfig, response: &GatewayResponse) {
    if echo_differs(sent, response) {
        tracing::warn!(
            path = %sent.path,
            echoed = ?response.route().map(|r| r.path),
            "gateway stored a different route than the one sent"
        );
    }
}

/// Gateway operations used by the lifecycle and reconciliation services.
#[derive(Clone)]
pub struct GatewayService {
    control_plane: Arc<dyn ControlPlane>,
}

impl GatewayService {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// `POST /veil/api/routes`.
    pub async fn register_route(&self, route: &RouteConfig) -> Result<GatewayResponse, GatewayError> {
        self.control_plane
            .perform(Method::POST, ROUTES_PATH, Some(encode(route)?))
            .await
            .map_err(GatewayError::Registration)
            .inspect(|response| check_echo(route, response))
    }

    /// `PUT /veil/api/routes/{encoded path}`.
    pub async fn update_route(&self, route: &RouteConfig) -> Result<GatewayResponse, GatewayError> {
        let uid = &route.required_subscription;
        self.control_plane
            .perform(Method::PUT, &route_resource(uid), Some(encode(route)?))
            .await
            .map_err(GatewayError::Update)
            .inspect(|response| check_echo(route, response))
    }

    /// `DELETE /veil/api/routes/{encoded path}`. A 404 means the route is already gone.
    pub async fn unregister_route(&self, uid: &str) -> Result<(), GatewayError> {
        match self
            .control_plane
            .perform(Method::DELETE, &route_resource(uid), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.status() == Some(404) => {
                tracing::debug!(api_uid = uid, "route already absent from gateway");
                Ok(())
            }
            Err(e) => Err(GatewayError::Unregistration(e)),
        }
    }

    /// Register, falling back to an update when the gateway already has the route.
    ///
    /// Covers a registration whose first attempt landed but whose response was lost.
    pub async fn ensure_route(&self, route: &RouteConfig) -> Result<GatewayResponse, GatewayError> {
        match self.register_route(route).await {
            Err(e) if e.has_status(409) => {
                tracing::info!(path = %route.path, "route already registered, updating instead");
                self.update_route(route).await
            }
            other => other,
        }
    }

    /// Update, falling back to registration when the gateway has no such route.
    pub async fn upsert_route(&self, route: &RouteConfig) -> Result<GatewayResponse, GatewayError> {
        match self.update_route(route).await {
            Err(e) if e.has_status(404) => {
                tracing::info!(path = %route.path, "route missing on gateway, registering");
                self.register_route(route).await
            }
            other => other,
        }
    }

    /// `POST /veil/api/keys`.
    pub async fn add_keys(
        &self,
        uid: &str,
        keys: Vec<GatewayKey>,
    ) -> Result<GatewayResponse, GatewayError> {
        let payload = AddKeysPayload {
            path: route_path(uid),
            api_keys: keys,
        };
        self.control_plane
            .perform(Method::POST, KEYS_PATH, Some(encode(&payload)?))
            .await
            .map_err(GatewayError::KeySync)
    }

    /// `PUT /veil/api/keys/status`.
    pub async fn set_key_status(
        &self,
        uid: &str,
        key: &str,
        is_active: bool,
    ) -> Result<GatewayResponse, GatewayError> {
        let payload = KeyStatusPayload {
            path: route_path(uid),
            api_key: key.to_string(),
            is_active,
        };
        self.control_plane
            .perform(Method::PUT, KEY_STATUS_PATH, Some(encode(&payload)?))
            .await
            .map_err(GatewayError::KeySync)
    }

    /// `DELETE /veil/api/keys`.
    pub async fn remove_key(&self, uid: &str, key: &str) -> Result<GatewayResponse, GatewayError> {
        let payload = RemoveKeyPayload {
            path: route_path(uid),
            api_key: key.to_string(),
        };
        self.control_plane
            .perform(Method::DELETE, KEYS_PATH, Some(encode(&payload)?))
            .await
            .map_err(GatewayError::KeySync)
    }
}
