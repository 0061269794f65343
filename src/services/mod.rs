//! Business logic layer.
//!
//! Services sit between the HTTP handlers and the repositories/gateway:
//!
//! - [`LifecycleService`]: create, approve, update, deactivate and delete listings
//! - [`KeyService`]: subscriptions and their API keys
//! - [`ReconcileService`]: repairs gateway drift left by fail-open operations
//!
//! [`SyncPolicy`] is shared by the first two and decides how a failed gateway call is handled.

pub mod key_service;
pub mod lifecycle_service;
pub mod reconcile_service;
pub mod sync_policy;

pub use key_service::KeyService;
pub use lifecycle_service::LifecycleService;
pub use reconcile_service::{ReconcileReport, ReconcileService, run_reconciler};
pub use sync_policy::SyncPolicy;
