//! Fail-open gateway calls.
//!
//! Every operation except approval keeps the database change when the gateway call fails.
//! This module runs such calls, turns their outcome into a [`GatewaySync`] and leaves a
//! pending-sync row behind whenever the gateway was not brought up to date.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::gateway::{GatewayError, HealthCheck};
use crate::models::sync::{GatewaySync, SyncReason};
use crate::repositories::PendingSyncRepository;

#[derive(Clone)]
pub struct SyncPolicy {
    pending: Arc<dyn PendingSyncRepository>,
    /// Consulted before each call when fast-fail is enabled.
    health: Option<Arc<dyn HealthCheck>>,
}

impl SyncPolicy {
    pub fn new(
        pending: Arc<dyn PendingSyncRepository>,
        health: Option<Arc<dyn HealthCheck>>,
    ) -> Self {
        Self { pending, health }
    }

    /// True only when fast-fail is on and the probe says the gateway is down.
    pub async fn gateway_known_down(&self) -> bool {
        match &self.health {
            Some(health) => !health.is_healthy().await,
            None => false,
        }
    }

    /// Run `call` unless the gateway is known down; record drift on anything but success.
    pub async fn best_effort<T, F>(&self, api_uid: Uuid, reason: SyncReason, call: F) -> GatewaySync
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        if self.gateway_known_down().await {
            tracing::warn!(
                %api_uid,
                reason = reason.as_str(),
                "gateway unavailable, deferring sync"
            );
            self.remember(api_uid, reason, Some(&GatewayError::Unavailable.to_string()))
                .await;
            return GatewaySync::Deferred;
        }

        match call.await {
            Ok(_) => GatewaySync::Applied,
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(
                    %api_uid,
                    reason = reason.as_str(),
                    error = %error,
                    "gateway sync failed, keeping database change"
                );
                self.remember(api_uid, reason, Some(&error)).await;
                GatewaySync::Failed { error }
            }
        }
    }

    /// Store a pending sync. A failure here is logged, never returned.
    pub async fn remember(&self, api_uid: Uuid, reason: SyncReason, error: Option<&str>) {
        if let Err(e) = self.pending.record(api_uid, reason, error).await {
            tracing::error!(
                %api_uid,
                reason = reason.as_str(),
                error = %e,
                "could not record pending gateway sync"
            );
        }
    }
}
