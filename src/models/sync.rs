//! Gateway drift tracking.
//!
//! Operations that keep going when the gateway call fails report a [`GatewaySync`] next to
//! their result and leave a [`PendingSync`] row behind for the reconciler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One API whose gateway state may not match the database.
///
/// # Database Table
///
/// Maps to the `pending_syncs` table, one row per API uid.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct PendingSync {
    pub api_uid: Uuid,

    /// What was being synced when the gateway call failed (see [`SyncReason`])
    pub reason: String,

    /// Reconciliation attempts made so far
    pub attempts: i32,

    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a pending sync was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    RouteUpdate,
    RouteRemoval,
    KeyAdd,
    KeyStatus,
    KeyRemoval,
    /// The route was registered but the status flip lost a race.
    ApprovalRace,
}

impl SyncReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::RouteUpdate => "route_update",
            SyncReason::RouteRemoval => "route_removal",
            SyncReason::KeyAdd => "key_add",
            SyncReason::KeyStatus => "key_status",
            SyncReason::KeyRemoval => "key_removal",
            SyncReason::ApprovalRace => "approval_race",
        }
    }
}

/// What happened on the gateway side of a fail-open operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GatewaySync {
    /// The gateway accepted the change.
    Applied,
    /// Nothing to tell the gateway (listing not active, or no routing change).
    Skipped,
    /// The gateway was known to be down; the change is queued for reconciliation.
    Deferred,
    /// The gateway call failed; the change is queued for reconciliation.
    Failed { error: String },
}

impl GatewaySync {
    pub fn is_drift(&self) -> bool {
        matches!(self, GatewaySync::Deferred | GatewaySync::Failed { .. })
    }
}

/// Result of a fail-open operation: the persisted value plus the gateway outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    pub value: T,
    pub gateway: GatewaySync,
}

impl<T> Synced<T> {
    pub fn new(value: T, gateway: GatewaySync) -> Self {
        Self { value, gateway }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        Synced {
            value: f(self.value),
            gateway: self.gateway,
        }
    }
}

/// HTTP body for fail-open operations.
#[derive(Debug, Serialize)]
pub struct SyncedResponse<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    pub gateway_sync: GatewaySync,
}

impl<T: Serialize> From<Synced<T>> for SyncedResponse<T> {
    fn from(synced: Synced<T>) -> Self {
        Self {
            data: synced.value,
            gateway_sync: synced.gateway,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gateway_sync_serializes_with_status_tag() {
        assert_eq!(
            serde_json::to_value(GatewaySync::Applied).unwrap(),
            json!({"status": "applied"})
        );
        assert_eq!(
            serde_json::to_value(GatewaySync::Failed {
                error: "gateway update failed: timeout".to_string()
            })
            .unwrap(),
            json!({"status": "failed", "error": "gateway update failed: timeout"})
        );
    }

    #[test]
    fn synced_response_flattens_value() {
        #[derive(Serialize)]
        struct Item {
            name: &'static str,
        }

        let body = SyncedResponse::from(Synced::new(Item { name: "x" }, GatewaySync::Skipped));
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"name": "x", "gateway_sync": {"status": "skipped"}})
        );
    }
}
