//! Mapping between marketplace listings and the gateway's route schema.
//!
//! Everything here is pure. The same listing and key set always produce the same
//! [`RouteConfig`], byte for byte, so re-applying a route is safe.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::api::ApiListing;
use crate::models::api_key::ApiKey;

/// Control-plane endpoint for route registration.
pub const ROUTES_PATH: &str = "/veil/api/routes";
/// Control-plane endpoint for key additions and removals.
pub const KEYS_PATH: &str = "/veil/api/keys";
/// Control-plane endpoint for key activation changes.
pub const KEY_STATUS_PATH: &str = "/veil/api/keys/status";
/// Gateway liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Route as the gateway stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub upstream: String,
    pub required_subscription: String,
    pub methods: Vec<String>,
    #[serde(default)]
    pub required_headers: Vec<String>,
    #[serde(default)]
    pub api_keys: Vec<GatewayKey>,
}

impl RouteConfig {
    /// API uid encoded in the route path (`/{uid}/*`).
    pub fn api_uid(&self) -> Option<&str> {
        self.path
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix("/*"))
            .filter(|uid| !uid.is_empty() && !uid.contains('/'))
    }
}

/// One key entry in a route or key payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayKey {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for GatewayKey {
    fn from(key: &ApiKey) -> Self {
        Self {
            key: key.key_value.clone(),
            name: key.name.clone(),
            is_active: Some(key.is_active),
            expires_at: key.expires_at,
        }
    }
}

/// Body of `POST /veil/api/keys`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddKeysPayload {
    pub path: String,
    pub api_keys: Vec<GatewayKey>,
}

/// Body of `PUT /veil/api/keys/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStatusPayload {
    pub path: String,
    pub api_key: String,
    pub is_active: bool,
}

/// Body of `DELETE /veil/api/keys`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveKeyPayload {
    pub path: String,
    pub api_key: String,
}

/// Gateway path pattern for an API: `/{uid}/*`.
pub fn route_path(uid: &str) -> String {
    format!("/{uid}/*")
}

/// Route path percent-encoded for use as a single URL segment.
pub fn encoded_route_path(uid: &str) -> String {
    url::form_urlencoded::byte_serialize(route_path(uid).as_bytes()).collect()
}

/// `/veil/api/routes/{encoded path}` for update and delete calls.
pub fn route_resource(uid: &str) -> String {
    format!("{ROUTES_PATH}/{}", encoded_route_path(uid))
}

/// Upstream URL the gateway forwards to.
///
/// An absolute `endpoint` wins outright; otherwise it is joined onto `base_url` with exactly
/// one slash between them.
pub fn normalize_upstream(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    }
}

/// Upper-cased, de-duplicated, sorted method list.
pub fn normalize_methods<S: AsRef<str>>(methods: &[S]) -> Vec<String> {
    methods
        .iter()
        .map(|m| m.as_ref().trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Translate a listing and the keys of all its subscriptions into a route.
pub fn to_route_config(listing: &ApiListing, keys: &[ApiKey]) -> RouteConfig {
    let uid = listing.uid.to_string();

    let mut api_keys: Vec<GatewayKey> = keys.iter().map(GatewayKey::from).collect();
    api_keys.sort_by(|a, b| a.key.cmp(&b.key));

    let required_headers = listing
        .required_headers
        .iter()
        .map(|h| h.name.trim().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    RouteConfig {
        path: route_path(&uid),
        upstream: normalize_upstream(&listing.base_url, &listing.endpoint),
        required_subscription: uid,
        methods: normalize_methods(&listing.methods),
        required_headers,
        api_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api::{ApiStatus, RequiredHeader};
    use chrono::TimeZone;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn listing() -> ApiListing {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        ApiListing {
            id: 7,
            uid: Uuid::parse_str("0b0f3c2e-6a0d-4c4e-9d7f-0d7c2c1f9a11").unwrap(),
            seller_id: Uuid::nil(),
            name: "Weather".to_string(),
            description: String::new(),
            endpoint: "/v1/forecast".to_string(),
            base_url: "https://weather.example.com/".to_string(),
            methods: vec!["get".to_string(), "POST".to_string(), "GET".to_string()],
            required_headers: Json(vec![
                RequiredHeader {
                    name: "X-Region".to_string(),
                    value: None,
                    description: Some("region code".to_string()),
                },
                RequiredHeader {
                    name: "X-Client".to_string(),
                    value: Some("marketplace".to_string()),
                    description: None,
                },
            ]),
            status: ApiStatus::Active,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn key(value: &str, active: bool) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            subscription_id: Uuid::nil(),
            key_value: value.to_string(),
            name: format!("{value}-name"),
            is_active: active,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn route_path_wraps_uid() {
        assert_eq!(route_path("abc-123"), "/abc-123/*");
        assert_eq!(route_path("abc-123"), route_path("abc-123"));
    }

    #[test]
    fn route_resource_encodes_slashes() {
        assert_eq!(encoded_route_path("abc-123"), "%2Fabc-123%2F*");
        assert_eq!(
            route_resource("abc-123"),
            "/veil/api/routes/%2Fabc-123%2F*"
        );
    }

    #[test]
    fn upstream_joins_base_and_endpoint() {
        assert_eq!(normalize_upstream("https://x.com/", "/v1"), "https://x.com/v1");
        assert_eq!(normalize_upstream("https://x.com", "v1"), "https://x.com/v1");
        assert_eq!(normalize_upstream("https://x.com//", "/v1"), "https://x.com/v1");
    }

    #[test]
    fn absolute_endpoint_is_used_verbatim() {
        assert_eq!(
            normalize_upstream("https://ignored.com/", "https://full.url/path"),
            "https://full.url/path"
        );
        assert_eq!(
            normalize_upstream("", "http://plain.example/x"),
            "http://plain.example/x"
        );
    }

    #[test]
    fn upstream_normalization_is_stable() {
        let once = normalize_upstream("https://x.com/", "/v1");
        assert_eq!(normalize_upstream("https://x.com/", "/v1"), once);
        assert_eq!(normalize_upstream("https://x.com/", &once), once);
    }

    #[test]
    fn route_config_is_deterministic() {
        let listing = listing();
        let keys = vec![key("vk_b", true), key("vk_a", false)];

        let first = serde_json::to_vec(&to_route_config(&listing, &keys)).unwrap();
        let second = serde_json::to_vec(&to_route_config(&listing, &keys)).unwrap();
        assert_eq!(first, second);

        let reversed: Vec<ApiKey> = keys.into_iter().rev().collect();
        let third = serde_json::to_vec(&to_route_config(&listing, &reversed)).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn route_config_fields() {
        let listing = listing();
        let route = to_route_config(&listing, &[key("vk_a", false)]);

        assert_eq!(route.path, format!("/{}/*", listing.uid));
        assert_eq!(route.required_subscription, listing.uid.to_string());
        assert_eq!(route.upstream, "https://weather.example.com/v1/forecast");
        assert_eq!(route.methods, vec!["GET", "POST"]);
        assert_eq!(route.required_headers, vec!["X-Client", "X-Region"]);
        assert_eq!(route.api_keys.len(), 1);
        assert_eq!(route.api_keys[0].is_active, Some(false));
        assert_eq!(route.api_uid(), Some(listing.uid.to_string().as_str()));
    }

    #[test]
    fn gateway_key_omits_missing_optionals() {
        let entry = GatewayKey {
            key: "vk_a".to_string(),
            name: "primary".to_string(),
            is_active: None,
            expires_at: None,
        };

        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"key": "vk_a", "name": "primary"})
        );
    }

    #[test]
    fn api_uid_rejects_foreign_paths() {
        let mut route = to_route_config(&listing(), &[]);
        route.path = "/nested/path/*".to_string();
        assert_eq!(route.api_uid(), None);

        route.path = "/plain".to_string();
        assert_eq!(route.api_uid(), None);
    }
}
