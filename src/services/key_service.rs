//! Subscriptions and API keys.
//!
//! The database is authoritative for keys. When the owning listing is active, every change
//! is mirrored to the gateway on a best-effort basis; failures are queued for reconciliation.

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::{GatewayKey, GatewayService};
use crate::models::api::ApiListing;
use crate::models::api_key::{ApiKey, CreateKeyRequest, NewApiKey};
use crate::models::subscription::{CreateSubscriptionRequest, Subscription};
use crate::models::sync::{GatewaySync, SyncReason, Synced};
use crate::repositories::Repositories;

use super::sync_policy::SyncPolicy;

/// Prefix of every generated key secret.
pub const KEY_PREFIX: &str = "vk_";

#[derive(Clone)]
pub struct KeyService {
    repos: Repositories,
    gateway: GatewayService,
    policy: SyncPolicy,
}

impl KeyService {
    pub fn new(repos: Repositories, gateway: GatewayService, policy: SyncPolicy) -> Self {
        Self {
            repos,
            gateway,
            policy,
        }
    }

    /// Subscribe a user to a listing. One subscription per (listing, user).
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, AppError> {
        let api = self
            .repos
            .apis
            .get_by_uid(request.api_uid)
            .await?
            .ok_or(AppError::ApiNotFound)?;

        let subscription = self
            .repos
            .subscriptions
            .create(api.id, request.user_id)
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            api_uid = %api.uid,
            user_id = %subscription.user_id,
            "subscription created"
        );

        Ok(subscription)
    }

    /// Issue a key for a subscription and push it to the gateway if the listing is live.
    pub async fn create_key(
        &self,
        subscription_id: Uuid,
        request: CreateKeyRequest,
    ) -> Result<Synced<ApiKey>, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "key name must not be empty".to_string(),
            ));
        }
        if request.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(AppError::InvalidRequest(
                "expires_at must be in the future".to_string(),
            ));
        }

        let subscription = self
            .repos
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        let api = self.api_by_id(subscription.api_id).await?;

        let key = self
            .repos
            .keys
            .create(NewApiKey {
                id: Uuid::new_v4(),
                subscription_id,
                key_value: generate_key(),
                name: name.to_string(),
                expires_at: request.expires_at,
            })
            .await?;

        tracing::info!(key_id = %key.id, api_uid = %api.uid, "api key issued");

        let sync = if api.is_active() {
            let uid = api.uid.to_string();
            self.policy
                .best_effort(
                    api.uid,
                    SyncReason::KeyAdd,
                    self.gateway.add_keys(&uid, vec![GatewayKey::from(&key)]),
                )
                .await
        } else {
            GatewaySync::Skipped
        };

        Ok(Synced::new(key, sync))
    }

    /// Activate or revoke a key.
    pub async fn set_key_status(
        &self,
        key_id: Uuid,
        is_active: bool,
    ) -> Result<Synced<ApiKey>, AppError> {
        let key = self.get_key(key_id).await?;
        let api = self.owning_api(&key).await?;

        let key = self.repos.keys.set_active(key_id, is_active).await?;

        tracing::info!(key_id = %key_id, is_active, "api key status changed");

        let sync = if api.is_active() {
            let uid = api.uid.to_string();
            self.policy
                .best_effort(
                    api.uid,
                    SyncReason::KeyStatus,
                    self.gateway.set_key_status(&uid, &key.key_value, is_active),
                )
                .await
        } else {
            GatewaySync::Skipped
        };

        Ok(Synced::new(key, sync))
    }

    /// Delete a key and withdraw it from the gateway.
    pub async fn delete_key(&self, key_id: Uuid) -> Result<Synced<()>, AppError> {
        let key = self.get_key(key_id).await?;
        let api = self.owning_api(&key).await?;

        self.repos.keys.delete(key_id).await?;

        tracing::info!(key_id = %key_id, api_uid = %api.uid, "api key deleted");

        let sync = if api.is_active() {
            let uid = api.uid.to_string();
            self.policy
                .best_effort(
                    api.uid,
                    SyncReason::KeyRemoval,
                    self.gateway.remove_key(&uid, &key.key_value),
                )
                .await
        } else {
            GatewaySync::Skipped
        };

        Ok(Synced::new((), sync))
    }

    async fn get_key(&self, key_id: Uuid) -> Result<ApiKey, AppError> {
        self.repos
            .keys
            .get(key_id)
            .await?
            .ok_or(AppError::KeyNotFound)
    }

    async fn owning_api(&self, key: &ApiKey) -> Result<ApiListing, AppError> {
        let subscription = self
            .repos
            .subscriptions
            .get(key.subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;

        self.api_by_id(subscription.api_id).await
    }

    async fn api_by_id(&self, api_id: i64) -> Result<ApiListing, AppError> {
        self.repos
            .apis
            .get_by_id(api_id)
            .await?
            .ok_or(AppError::ApiNotFound)
    }
}

/// Generate a key secret: `vk_` followed by 64 hex characters.
pub fn generate_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}
