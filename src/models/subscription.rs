//! Subscription model: grants a user access to one API listing and owns that user's keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,

    /// Internal id of the subscribed listing
    pub api_id: i64,

    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request body for subscribing a user to an API.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub api_uid: Uuid,
    pub user_id: Uuid,
}
