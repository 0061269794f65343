//! API listing data models and request/response types.
//!
//! This module defines:
//! - `ApiListing`: Database entity representing a seller's upstream API
//! - `CreateApiRequest` / `UpdateApiRequest`: Request bodies for the admin endpoints
//! - `ApiResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::gateway::translator::normalize_methods;

pub use super::lifecycle::ApiStatus;

/// Represents an API listing record from the database.
///
/// # Database Table
///
/// Maps to the `apis` table. The `uid` is the identity the gateway knows the listing by;
/// the numeric `id` only links subscriptions to it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ApiListing {
    pub id: i64,

    /// Stable external identifier, also the gateway route key
    pub uid: Uuid,

    pub seller_id: Uuid,
    pub name: String,
    pub description: String,

    /// Path suffix appended to `base_url`, or an absolute URL used as-is
    pub endpoint: String,

    /// Upstream origin
    pub base_url: String,

    /// Allowed HTTP methods (never empty)
    pub methods: Vec<String>,

    /// Headers every consumer request must carry
    pub required_headers: Json<Vec<RequiredHeader>>,

    /// Lifecycle state, stored as text
    #[sqlx(try_from = "String")]
    pub status: ApiStatus,

    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiListing {
    /// Whether the listing is currently registered with the gateway.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether moving from `self` to `other` changes anything the gateway routes on.
    pub fn routing_differs(&self, other: &ApiListing) -> bool {
        self.endpoint != other.endpoint
            || self.base_url != other.base_url
            || normalize_methods(&self.methods) != normalize_methods(&other.methods)
            || self.required_headers.0 != other.required_headers.0
    }
}

/// A header consumers must send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredHeader {
    pub name: String,

    /// Fixed value the header must have, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fields needed to insert a new listing.
#[derive(Debug, Clone)]
pub struct NewApi {
    pub uid: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub base_url: String,
    pub methods: Vec<String>,
    pub required_headers: Vec<RequiredHeader>,
    pub is_public: bool,
}

/// Request body for registering a new API.
///
/// # JSON Example
///
/// ```json
/// {
///   "seller_id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Weather",
///   "endpoint": "/v1/forecast",
///   "base_url": "https://weather.example.com",
///   "methods": ["GET"],
///   "required_headers": [{"name": "X-Region"}]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateApiRequest {
    pub seller_id: Uuid,
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub endpoint: String,
    pub base_url: String,
    pub methods: Vec<String>,

    #[serde(default)]
    pub required_headers: Vec<RequiredHeader>,

    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

fn default_is_public() -> bool {
    true
}

/// Request body for editing a listing. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApiRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub endpoint: Option<String>,
    pub base_url: Option<String>,
    pub methods: Option<Vec<String>>,
    pub required_headers: Option<Vec<RequiredHeader>>,
    pub is_public: Option<bool>,
}

impl UpdateApiRequest {
    /// Listing as it would look after this update.
    pub fn applied_to(self, listing: &ApiListing) -> ApiListing {
        let mut updated = listing.clone();

        if let Some(name) = self.name {
            updated.name = name;
        }
        if let Some(description) = self.description {
            updated.description = description;
        }
        if let Some(endpoint) = self.endpoint {
            updated.endpoint = endpoint;
        }
        if let Some(base_url) = self.base_url {
            updated.base_url = base_url;
        }
        if let Some(methods) = self.methods {
            updated.methods = methods;
        }
        if let Some(headers) = self.required_headers {
            updated.required_headers = Json(headers);
        }
        if let Some(is_public) = self.is_public {
            updated.is_public = is_public;
        }

        updated
    }
}

/// Response body for API endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "uid": "0b0f3c2e-6a0d-4c4e-9d7f-0d7c2c1f9a11",
///   "name": "Weather",
///   "status": "active",
///   "is_active": true,
///   "gateway_url": "https://gw.example.com/0b0f3c2e-6a0d-4c4e-9d7f-0d7c2c1f9a11"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub uid: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub base_url: String,
    pub methods: Vec<String>,
    pub required_headers: Vec<RequiredHeader>,
    pub status: ApiStatus,
    pub is_active: bool,
    pub is_public: bool,

    /// Where consumers call this API through the gateway
    pub gateway_url: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiResponse {
    /// Build a response, deriving `gateway_url` from the configured public gateway origin.
    pub fn new(listing: ApiListing, public_gateway_url: &str) -> Self {
        Self {
            gateway_url: format!("{}/{}", public_gateway_url, listing.uid),
            uid: listing.uid,
            seller_id: listing.seller_id,
            name: listing.name,
            description: listing.description,
            endpoint: listing.endpoint,
            base_url: listing.base_url,
            methods: listing.methods,
            required_headers: listing.required_headers.0,
            is_active: listing.status.is_active(),
            status: listing.status,
            is_public: listing.is_public,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ApiListing {
        let now = Utc::now();
        ApiListing {
            id: 1,
            uid: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            name: "Weather".to_string(),
            description: String::new(),
            endpoint: "/v1".to_string(),
            base_url: "https://x.com".to_string(),
            methods: vec!["GET".to_string()],
            required_headers: Json(vec![]),
            status: ApiStatus::Active,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cosmetic_changes_do_not_touch_routing() {
        let before = listing();
        let after = UpdateApiRequest {
            name: Some("Weather Pro".to_string()),
            description: Some("Forecasts".to_string()),
            is_public: Some(false),
            ..UpdateApiRequest::default()
        }
        .applied_to(&before);

        assert_eq!(after.name, "Weather Pro");
        assert!(!before.routing_differs(&after));
    }

    #[test]
    fn routing_fields_are_detected() {
        let before = listing();

        let endpoint = UpdateApiRequest {
            endpoint: Some("/v2".to_string()),
            ..UpdateApiRequest::default()
        }
        .applied_to(&before);
        assert!(before.routing_differs(&endpoint));

        let headers = UpdateApiRequest {
            required_headers: Some(vec![RequiredHeader {
                name: "X-Region".to_string(),
                value: None,
                description: None,
            }]),
            ..UpdateApiRequest::default()
        }
        .applied_to(&before);
        assert!(before.routing_differs(&headers));
    }

    #[test]
    fn method_case_and_order_are_not_routing_changes() {
        let mut before = listing();
        before.methods = vec!["GET".to_string(), "POST".to_string()];

        let after = UpdateApiRequest {
            methods: Some(vec!["post".to_string(), "get".to_string()]),
            ..UpdateApiRequest::default()
        }
        .applied_to(&before);

        assert!(!before.routing_differs(&after));
    }

    #[test]
    fn response_derives_gateway_url() {
        let listing = listing();
        let uid = listing.uid;
        let response = ApiResponse::new(listing, "https://gw.example.com");

        assert_eq!(response.gateway_url, format!("https://gw.example.com/{uid}"));
        assert!(response.is_active);
    }
}
