//! In-memory repositories.
//!
//! Mirrors the Postgres behaviour that the services rely on: compare-and-set status flips,
//! cascading deletes and unique subscriptions per (api, user).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sqlx::types::Json;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    ApiRepository, KeyRepository, PendingSyncRepository, RepositoryError, SubscriptionRepository,
};
use crate::models::api::{ApiListing, ApiStatus, NewApi};
use crate::models::api_key::{ApiKey, NewApiKey};
use crate::models::subscription::Subscription;
use crate::models::sync::{PendingSync, SyncReason};

#[derive(Debug, Default)]
struct State {
    next_api_id: i64,
    apis: HashMap<Uuid, ApiListing>,
    subscriptions: HashMap<Uuid, Subscription>,
    keys: HashMap<Uuid, ApiKey>,
    pending: HashMap<Uuid, PendingSync>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().await
    }
}

#[async_trait]
impl ApiRepository for InMemoryStore {
    async fn create(&self, api: NewApi) -> Result<ApiListing, RepositoryError> {
        let mut state = self.lock().await;
        if state.apis.contains_key(&api.uid) {
            return Err(RepositoryError::Conflict("api already exists".to_string()));
        }

        state.next_api_id += 1;
        let now = Utc::now();
        let listing = ApiListing {
            id: state.next_api_id,
            uid: api.uid,
            seller_id: api.seller_id,
            name: api.name,
            description: api.description,
            endpoint: api.endpoint,
            base_url: api.base_url,
            methods: api.methods,
            required_headers: Json(api.required_headers),
            status: ApiStatus::Pending,
            is_public: api.is_public,
            created_at: now,
            updated_at: now,
        };
        state.apis.insert(listing.uid, listing.clone());

        Ok(listing)
    }

    async fn get_by_uid(&self, uid: Uuid) -> Result<Option<ApiListing>, RepositoryError> {
        Ok(self.lock().await.apis.get(&uid).cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ApiListing>, RepositoryError> {
        Ok(self
            .lock()
            .await
            .apis
            .values()
            .find(|api| api.id == id)
            .cloned())
    }

    async fn update_details(&self, api: &ApiListing) -> Result<ApiListing, RepositoryError> {
        let mut state = self.lock().await;
        let stored = state
            .apis
            .get_mut(&api.uid)
            .ok_or_else(|| RepositoryError::NotFound(format!("api {}", api.uid)))?;

        stored.name = api.name.clone();
        stored.description = api.description.clone();
        stored.endpoint = api.endpoint.clone();
        stored.base_url = api.base_url.clone();
        stored.methods = api.methods.clone();
        stored.required_headers = api.required_headers.clone();
        stored.is_public = api.is_public;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn transition_status(
        &self,
        uid: Uuid,
        from: ApiStatus,
        to: ApiStatus,
    ) -> Result<ApiListing, RepositoryError> {
        let mut state = self.lock().await;
        let stored = state
            .apis
            .get_mut(&uid)
            .ok_or_else(|| RepositoryError::NotFound(format!("api {uid}")))?;

        if stored.status != from {
            return Err(RepositoryError::Conflict(format!(
                "api {uid} is no longer {from}"
            )));
        }

        stored.status = to;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete(&self, uid: Uuid) -> Result<(), RepositoryError> {
        let mut state = self.lock().await;
        let api = state
            .apis
            .remove(&uid)
            .ok_or_else(|| RepositoryError::NotFound(format!("api {uid}")))?;

        let subscription_ids: Vec<Uuid> = state
            .subscriptions
            .values()
            .filter(|s| s.api_id == api.id)
            .map(|s| s.id)
            .collect();
        for id in &subscription_ids {
            state.subscriptions.remove(id);
        }
        state
            .keys
            .retain(|_, key| !subscription_ids.contains(&key.subscription_id));

        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn create(&self, api_id: i64, user_id: Uuid) -> Result<Subscription, RepositoryError> {
        let mut state = self.lock().await;
        if state
            .subscriptions
            .values()
            .any(|s| s.api_id == api_id && s.user_id == user_id)
        {
            return Err(RepositoryError::Conflict(
                "subscription already exists".to_string(),
            ));
        }

        let subscription = Subscription {
            id: Uuid::new_v4(),
            api_id,
            user_id,
            created_at: Utc::now(),
        };
        state
            .subscriptions
            .insert(subscription.id, subscription.clone());

        Ok(subscription)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Subscription>, RepositoryError> {
        Ok(self.lock().await.subscriptions.get(&id).cloned())
    }
}

#[async_trait]
impl KeyRepository for InMemoryStore {
    async fn create(&self, key: NewApiKey) -> Result<ApiKey, RepositoryError> {
        let mut state = self.lock().await;
        if state.keys.values().any(|k| k.key_value == key.key_value) {
            return Err(RepositoryError::Conflict("api key already exists".to_string()));
        }

        let key = ApiKey {
            id: key.id,
            subscription_id: key.subscription_id,
            key_value: key.key_value,
            name: key.name,
            is_active: true,
            expires_at: key.expires_at,
            created_at: Utc::now(),
        };
        state.keys.insert(key.id, key.clone());

        Ok(key)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, RepositoryError> {
        Ok(self.lock().await.keys.get(&id).cloned())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<ApiKey, RepositoryError> {
        let mut state = self.lock().await;
        let key = state
            .keys
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("api key {id}")))?;
        key.is_active = is_active;

        Ok(key.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.lock()
            .await
            .keys
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("api key {id}")))
    }

    async fn list_for_api(&self, api_id: i64) -> Result<Vec<ApiKey>, RepositoryError> {
        let state = self.lock().await;
        let mut keys: Vec<ApiKey> = state
            .keys
            .values()
            .filter(|key| {
                state
                    .subscriptions
                    .get(&key.subscription_id)
                    .is_some_and(|s| s.api_id == api_id)
            })
            .cloned()
            .collect();
        keys.sort_by_key(|key| key.created_at);

        Ok(keys)
    }
}

#[async_trait]
impl PendingSyncRepository for InMemoryStore {
    async fn record(
        &self,
        api_uid: Uuid,
        reason: SyncReason,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock().await;
        let now = Utc::now();

        state
            .pending
            .entry(api_uid)
            .and_modify(|pending| {
                pending.reason = reason.as_str().to_string();
                pending.last_error = error.map(str::to_string);
                // Strictly later, so a stale clear never matches a re-recorded row
                pending.updated_at = now.max(pending.updated_at + TimeDelta::microseconds(1));
            })
            .or_insert_with(|| PendingSync {
                api_uid,
                reason: reason.as_str().to_string(),
                attempts: 0,
                last_error: error.map(str::to_string),
                created_at: now,
                updated_at: now,
            });

        Ok(())
    }

    async fn list_due(&self, limit: i64) -> Result<Vec<PendingSync>, RepositoryError> {
        let state = self.lock().await;
        let mut pending: Vec<PendingSync> = state.pending.values().cloned().collect();
        pending.sort_by_key(|p| p.updated_at);
        pending.truncate(limit.max(0) as usize);

        Ok(pending)
    }

    async fn mark_failed(&self, api_uid: Uuid, error: &str) -> Result<(), RepositoryError> {
        if let Some(pending) = self.lock().await.pending.get_mut(&api_uid) {
            pending.attempts += 1;
            pending.last_error = Some(error.to_string());
            pending.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn clear(&self, pending: &PendingSync) -> Result<bool, RepositoryError> {
        let mut state = self.lock().await;
        let unchanged = state
            .pending
            .get(&pending.api_uid)
            .is_some_and(|stored| stored.updated_at == pending.updated_at);
        if unchanged {
            state.pending.remove(&pending.api_uid);
        }

        Ok(unchanged)
    }
}
