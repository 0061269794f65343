//! Persistence for listings, subscriptions, keys and pending gateway syncs.
//!
//! ## Implementations
//!
//! - [`PgStore`]: PostgreSQL via sqlx, used by the server
//! - [`InMemoryStore`]: process-local maps for tests and local experiments
//!
//! Both implement every repository trait; [`Repositories`] bundles one backend behind
//! trait objects for the services.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::api::{ApiListing, ApiStatus, NewApi};
use crate::models::api_key::{ApiKey, NewApiKey};
use crate::models::subscription::Subscription;
use crate::models::sync::{PendingSync, SyncReason};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or compare-and-set check failed.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ApiRepository: Send + Sync {
    async fn create(&self, api: NewApi) -> Result<ApiListing, RepositoryError>;
    async fn get_by_uid(&self, uid: Uuid) -> Result<Option<ApiListing>, RepositoryError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<ApiListing>, RepositoryError>;

    /// Persist every editable field of `api`. Never touches `status`.
    async fn update_details(&self, api: &ApiListing) -> Result<ApiListing, RepositoryError>;

    /// Move `uid` from `from` to `to`, failing with `Conflict` if it is no longer in `from`.
    async fn transition_status(
        &self,
        uid: Uuid,
        from: ApiStatus,
        to: ApiStatus,
    ) -> Result<ApiListing, RepositoryError>;

    /// Remove the listing together with its subscriptions and keys.
    async fn delete(&self, uid: Uuid) -> Result<(), RepositoryError>;

    /// Cheap round trip to the backend, for health checks.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, api_id: i64, user_id: Uuid) -> Result<Subscription, RepositoryError>;
    async fn get(&self, id: Uuid) -> Result<Option<Subscription>, RepositoryError>;
}

#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn create(&self, key: NewApiKey) -> Result<ApiKey, RepositoryError>;
    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, RepositoryError>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<ApiKey, RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Keys of every subscription to the listing with internal id `api_id`.
    async fn list_for_api(&self, api_id: i64) -> Result<Vec<ApiKey>, RepositoryError>;
}

#[async_trait]
pub trait PendingSyncRepository: Send + Sync {
    /// Insert or refresh the pending sync for `api_uid`.
    async fn record(
        &self,
        api_uid: Uuid,
        reason: SyncReason,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Oldest pending syncs first.
    async fn list_due(&self, limit: i64) -> Result<Vec<PendingSync>, RepositoryError>;

    /// Count one more failed reconciliation attempt.
    async fn mark_failed(&self, api_uid: Uuid, error: &str) -> Result<(), RepositoryError>;

    /// Remove the row if it is still the one that was read.
    ///
    /// Returns `false` when it was recorded again since (`updated_at` moved on), in which
    /// case the newer row is kept.
    async fn clear(&self, pending: &PendingSync) -> Result<bool, RepositoryError>;
}

/// One storage backend, shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub apis: Arc<dyn ApiRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub keys: Arc<dyn KeyRepository>,
    pub pending: Arc<dyn PendingSyncRepository>,
}

impl Repositories {
    pub fn postgres(pool: DbPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ApiRepository
            + SubscriptionRepository
            + KeyRepository
            + PendingSyncRepository
            + 'static,
    {
        Self {
            apis: store.clone(),
            subscriptions: store.clone(),
            keys: store.clone(),
            pending: store,
        }
    }
}
