//! Background repair of gateway drift.
//!
//! Fail-open operations leave a pending-sync row per listing when the gateway could not be
//! updated. A reconciliation pass re-derives what the gateway should hold for each such
//! listing from the database and applies it idempotently:
//!
//! - active listing: update the route with the full key list, registering it if missing
//! - pending, inactive or deleted listing: unregister the route (already gone counts as done)

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::{GatewayService, HealthCheck, to_route_config};
use crate::repositories::Repositories;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub resolved: usize,
    pub failed: usize,

    /// The gateway was down, so nothing was attempted.
    pub skipped: bool,
}

#[derive(Clone)]
pub struct ReconcileService {
    repos: Repositories,
    gateway: GatewayService,
    health: Arc<dyn HealthCheck>,
    batch_size: i64,
}

impl ReconcileService {
    pub fn new(
        repos: Repositories,
        gateway: GatewayService,
        health: Arc<dyn HealthCheck>,
        batch_size: i64,
    ) -> Self {
        Self {
            repos,
            gateway,
            health,
            batch_size,
        }
    }

    /// Work through the oldest pending syncs, up to the batch size.
    pub async fn reconcile_pending(&self) -> Result<ReconcileReport, AppError> {
        if !self.health.is_healthy().await {
            tracing::debug!("gateway unhealthy, skipping reconciliation pass");
            return Ok(ReconcileReport {
                skipped: true,
                ..Default::default()
            });
        }

        let due = self.repos.pending.list_due(self.batch_size).await?;
        let mut report = ReconcileReport {
            examined: due.len(),
            ..Default::default()
        };

        for pending in due {
            match self.reconcile_api(pending.api_uid).await {
                Ok(()) => {
                    if !self.repos.pending.clear(&pending).await? {
                        tracing::debug!(
                            api_uid = %pending.api_uid,
                            "pending sync re-recorded during pass, keeping it"
                        );
                    }
                    report.resolved += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        api_uid = %pending.api_uid,
                        reason = %pending.reason,
                        attempts = pending.attempts + 1,
                        error = %e,
                        "reconciliation failed"
                    );
                    self.repos
                        .pending
                        .mark_failed(pending.api_uid, &e.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                resolved = report.resolved,
                failed = report.failed,
                "reconciliation pass finished"
            );
        }

        Ok(report)
    }

    /// Bring the gateway in line with the database for one listing.
    pub async fn reconcile_api(&self, api_uid: Uuid) -> Result<(), AppError> {
        match self.repos.apis.get_by_uid(api_uid).await? {
            Some(listing) if listing.is_active() => {
                let keys = self.repos.keys.list_for_api(listing.id).await?;
                let route = to_route_config(&listing, &keys);
                self.gateway.upsert_route(&route).await?;
            }
            _ => {
                self.gateway
                    .unregister_route(&api_uid.to_string())
                    .await?;
            }
        }

        Ok(())
    }
}

/// Run reconciliation passes forever, one per `every`.
///
/// A failing pass is logged and the loop carries on.
pub async fn run_reconciler(service: Arc<ReconcileService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = every.as_secs(), "reconciler started");

    loop {
        ticker.tick().await;
        if let Err(e) = service.reconcile_pending().await {
            tracing::error!(error = %e, "reconciliation pass aborted");
        }
    }
}
