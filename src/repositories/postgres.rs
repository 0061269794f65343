//! PostgreSQL repositories.

use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    ApiRepository, KeyRepository, PendingSyncRepository, RepositoryError, SubscriptionRepository,
};
use crate::db::DbPool;
use crate::models::api::{ApiListing, ApiStatus, NewApi};
use crate::models::api_key::{ApiKey, NewApiKey};
use crate::models::subscription::Subscription;
use crate::models::sync::{PendingSync, SyncReason};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map unique-constraint violations to `Conflict`, everything else to `Database`.
fn conflict_or_database(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        _ => RepositoryError::Database(err),
    }
}

#[async_trait]
impl ApiRepository for PgStore {
    async fn create(&self, api: NewApi) -> Result<ApiListing, RepositoryError> {
        sqlx::query_as::<_, ApiListing>(
            r#"
            INSERT INTO apis (
                uid,
                seller_id,
                name,
                description,
                endpoint,
                base_url,
                methods,
                required_headers,
                status,
                is_public
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(api.uid)
        .bind(api.seller_id)
        .bind(&api.name)
        .bind(&api.description)
        .bind(&api.endpoint)
        .bind(&api.base_url)
        .bind(&api.methods)
        .bind(Json(&api.required_headers))
        .bind(ApiStatus::Pending.as_str())
        .bind(api.is_public)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "api"))
    }

    async fn get_by_uid(&self, uid: Uuid) -> Result<Option<ApiListing>, RepositoryError> {
        let api = sqlx::query_as::<_, ApiListing>("SELECT * FROM apis WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(api)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ApiListing>, RepositoryError> {
        let api = sqlx::query_as::<_, ApiListing>("SELECT * FROM apis WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(api)
    }

    async fn update_details(&self, api: &ApiListing) -> Result<ApiListing, RepositoryError> {
        sqlx::query_as::<_, ApiListing>(
            r#"
            UPDATE apis
            SET name = $1,
                description = $2,
                endpoint = $3,
                base_url = $4,
                methods = $5,
                required_headers = $6,
                is_public = $7,
                updated_at = NOW()
            WHERE uid = $8
            RETURNING *
            "#,
        )
        .bind(&api.name)
        .bind(&api.description)
        .bind(&api.endpoint)
        .bind(&api.base_url)
        .bind(&api.methods)
        .bind(&api.required_headers)
        .bind(api.is_public)
        .bind(api.uid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("api {}", api.uid)))
    }

    async fn transition_status(
        &self,
        uid: Uuid,
        from: ApiStatus,
        to: ApiStatus,
    ) -> Result<ApiListing, RepositoryError> {
        // Compare-and-set: only flips if nobody moved the listing since it was read
        let updated = sqlx::query_as::<_, ApiListing>(
            r#"
            UPDATE apis
            SET status = $1,
                updated_at = NOW()
            WHERE uid = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(uid)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(api) = updated {
            return Ok(api);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM apis WHERE uid = $1)")
            .bind(uid)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Err(RepositoryError::Conflict(format!(
                "api {uid} is no longer {from}"
            )))
        } else {
            Err(RepositoryError::NotFound(format!("api {uid}")))
        }
    }

    async fn delete(&self, uid: Uuid) -> Result<(), RepositoryError> {
        // Subscriptions and keys go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM apis WHERE uid = $1")
            .bind(uid)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("api {uid}")));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn create(&self, api_id: i64, user_id: Uuid) -> Result<Subscription, RepositoryError> {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, api_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(api_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "subscription"))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Subscription>, RepositoryError> {
        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(subscription)
    }
}

#[async_trait]
impl KeyRepository for PgStore {
    async fn create(&self, key: NewApiKey) -> Result<ApiKey, RepositoryError> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (id, subscription_id, key_value, name, is_active, expires_at)
            VALUES ($1, $2, $3, $4, true, $5)
            RETURNING *
            "#,
        )
        .bind(key.id)
        .bind(key.subscription_id)
        .bind(&key.key_value)
        .bind(&key.name)
        .bind(key.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "api key"))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, RepositoryError> {
        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(key)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<ApiKey, RepositoryError> {
        sqlx::query_as::<_, ApiKey>("UPDATE api_keys SET is_active = $1 WHERE id = $2 RETURNING *")
            .bind(is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("api key {id}")))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("api key {id}")));
        }

        Ok(())
    }

    async fn list_for_api(&self, api_id: i64) -> Result<Vec<ApiKey>, RepositoryError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT k.*
            FROM api_keys k
            JOIN subscriptions s ON s.id = k.subscription_id
            WHERE s.api_id = $1
            ORDER BY k.created_at
            "#,
        )
        .bind(api_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }
}

#[async_trait]
impl PendingSyncRepository for PgStore {
    async fn record(
        &self,
        api_uid: Uuid,
        reason: SyncReason,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO pending_syncs (api_uid, reason, last_error)
            VALUES ($1, $2, $3)
            ON CONFLICT (api_uid) DO UPDATE
            SET reason = EXCLUDED.reason,
                last_error = EXCLUDED.last_error,
                updated_at = NOW()
            "#,
        )
        .bind(api_uid)
        .bind(reason.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_due(&self, limit: i64) -> Result<Vec<PendingSync>, RepositoryError> {
        let pending = sqlx::query_as::<_, PendingSync>(
            "SELECT * FROM pending_syncs ORDER BY updated_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(pending)
    }

    async fn mark_failed(&self, api_uid: Uuid, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE pending_syncs
            SET attempts = attempts + 1,
                last_error = $1,
                updated_at = NOW()
            WHERE api_uid = $2
            "#,
        )
        .bind(error)
        .bind(api_uid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, pending: &PendingSync) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM pending_syncs WHERE api_uid = $1 AND updated_at = $2")
                .bind(pending.api_uid)
                .bind(pending.updated_at)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
