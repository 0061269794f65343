//! API Key model.
//!
//! Keys belong to a subscription, which belongs to one API listing. The secret value is what
//! consumers present to the gateway, so unlike a login credential it must be stored in a form
//! the gateway can be told about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `subscription_id`: Owning subscription
/// - `key_value`: Secret presented by consumers
/// - `name`: Human-readable label
/// - `is_active`: Whether the gateway should accept the key
/// - `expires_at`: Optional expiry enforced by the gateway
/// - `created_at`: When the key was created
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    pub subscription_id: Uuid,

    /// Secret value sent to the gateway and handed to the consumer once
    pub key_value: String,

    pub name: String,

    /// Whether this API key is currently active
    ///
    /// Inactive keys stay in the gateway's key list flagged inactive, so revocation does not
    /// need a delete.
    pub is_active: bool,

    pub expires_at: Option<DateTime<Utc>>,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a key.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub key_value: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for issuing a key.
///
/// ```json
/// { "name": "production", "expires_at": "2026-01-01T00:00:00Z" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for activating or revoking a key.
#[derive(Debug, Deserialize)]
pub struct KeyStatusRequest {
    pub is_active: bool,
}

/// Response body for key endpoints.
///
/// The secret is only included when the key is created.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            subscription_id: key.subscription_id,
            name: key.name,
            key: None, // Never include the secret by default
            is_active: key.is_active,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}

impl ApiKeyResponse {
    /// Create response with the secret included (only for issuance).
    pub fn with_key(mut self, key: String) -> Self {
        self.key = Some(key);
        self
    }
}
