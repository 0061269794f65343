//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{ControlPlane, GatewayService, HealthCheck};
use crate::repositories::Repositories;
use crate::services::{KeyService, LifecycleService, ReconcileService, SyncPolicy};

/// Settings the services need beyond their collaborators.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Public gateway origin, without trailing slash
    pub public_gateway_url: String,

    /// Consult the health probe before gateway calls
    pub fast_fail: bool,

    pub reconcile_batch_size: i64,
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            public_gateway_url: config.public_gateway_url(),
            fast_fail: config.gateway_fast_fail,
            reconcile_batch_size: config.reconcile_batch_size,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleService>,
    pub keys: Arc<KeyService>,
    pub reconciler: Arc<ReconcileService>,
    pub repos: Repositories,
    pub health: Arc<dyn HealthCheck>,
    pub public_gateway_url: Arc<str>,
}

impl AppState {
    /// Wire the services around one storage backend and one control plane.
    pub fn new(
        repos: Repositories,
        control_plane: Arc<dyn ControlPlane>,
        health: Arc<dyn HealthCheck>,
        options: SyncOptions,
    ) -> Self {
        let gateway = GatewayService::new(control_plane);
        let policy = SyncPolicy::new(
            repos.pending.clone(),
            options.fast_fail.then(|| health.clone()),
        );

        Self {
            lifecycle: Arc::new(LifecycleService::new(
                repos.clone(),
                gateway.clone(),
                policy.clone(),
            )),
            keys: Arc::new(KeyService::new(repos.clone(), gateway.clone(), policy)),
            reconciler: Arc::new(ReconcileService::new(
                repos.clone(),
                gateway,
                health.clone(),
                options.reconcile_batch_size,
            )),
            repos,
            health,
            public_gateway_url: options.public_gateway_url.into(),
        }
    }
}
