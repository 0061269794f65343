//! End-to-end lifecycle tests against a mock gateway.
//!
//! The services run on in-memory repositories and talk HTTP to a wiremock server through the
//! real retrying client. Backoff sleeps are recorded instead of awaited.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use marketplace_gateway_sync::{
    AppState, SyncOptions,
    error::AppError,
    gateway::{HealthProbe, HttpControlPlane, RetryPolicy, Sleeper},
    models::{
        api::{ApiStatus, CreateApiRequest, UpdateApiRequest},
        sync::GatewaySync,
    },
    repositories::Repositories,
};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

struct Harness {
    server: MockServer,
    state: AppState,
    repos: Repositories,
    sleeper: Arc<RecordingSleeper>,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let control_plane = HttpControlPlane::new(
        &server.uri(),
        Duration::from_secs(2),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: false,
        },
        sleeper.clone(),
    )
    .unwrap();
    let health = HealthProbe::new(&server.uri(), Duration::from_secs(1)).unwrap();
    let repos = Repositories::in_memory();

    let state = AppState::new(
        repos.clone(),
        Arc::new(control_plane),
        Arc::new(health),
        SyncOptions {
            public_gateway_url: "https://gw.example.com".to_string(),
            fast_fail: false,
            reconcile_batch_size: 50,
        },
    );

    Harness {
        server,
        state,
        repos,
        sleeper,
    }
}

fn create_request() -> CreateApiRequest {
    serde_json::from_value(json!({
        "seller_id": Uuid::new_v4(),
        "name": "Weather",
        "endpoint": "/v1",
        "base_url": "https://x.com/",
        "methods": ["GET"]
    }))
    .unwrap()
}

fn success() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "message": "ok" }))
}

async fn received(server: &MockServer, http_method: &str, prefix: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path().starts_with(prefix))
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

#[tokio::test]
async fn create_then_approve_registers_one_route() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(success())
        .expect(1)
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    assert!(received(&h.server, "POST", "/veil").await.is_empty());

    let approved = h.state.lifecycle.approve_api(listing.uid).await.unwrap();

    assert_eq!(approved.status, ApiStatus::Active);
    let bodies = received(&h.server, "POST", "/veil/api/routes").await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["path"], format!("/{}/*", listing.uid));
    assert_eq!(bodies[0]["upstream"], "https://x.com/v1");
    assert_eq!(bodies[0]["required_subscription"], listing.uid.to_string());
    assert_eq!(bodies[0]["methods"], json!(["GET"]));
}

#[tokio::test]
async fn approve_against_failing_gateway_stays_inactive() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "overloaded" })))
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    let err = h.state.lifecycle.approve_api(listing.uid).await.unwrap_err();

    assert!(matches!(err, AppError::Gateway(_)));
    assert!(err.to_string().contains("registration failed"));
    assert!(err.to_string().contains("overloaded"));
    assert_eq!(received(&h.server, "POST", "/veil/api/routes").await.len(), 3);
    assert_eq!(
        *h.sleeper.slept.lock().unwrap(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );

    let stored = h.state.lifecycle.get_api(listing.uid).await.unwrap();
    assert!(!stored.is_active());
}

#[tokio::test]
async fn rejected_registration_is_not_retried() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "bad upstream" })))
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    let err = h.state.lifecycle.approve_api(listing.uid).await.unwrap_err();

    assert!(err.to_string().contains("bad upstream"));
    assert_eq!(received(&h.server, "POST", "/veil/api/routes").await.len(), 1);
    assert!(h.sleeper.slept.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deactivate_with_failing_gateway_still_persists_inactive() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(success())
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/veil/api/routes/.+"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    h.state.lifecycle.approve_api(listing.uid).await.unwrap();

    let result = h.state.lifecycle.deactivate_api(listing.uid).await.unwrap();

    assert_eq!(result.value.status, ApiStatus::Inactive);
    assert!(matches!(result.gateway, GatewaySync::Failed { .. }));
    let deletes = h
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .collect::<Vec<_>>();
    assert_eq!(deletes.len(), 3);
    assert_eq!(
        deletes[0].url.path(),
        format!("/veil/api/routes/%2F{}%2F*", listing.uid)
    );
    assert_eq!(h.repos.pending.list_due(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reconcile_repairs_failed_update() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(success())
        .mount(&h.server)
        .await;
    // First update attempt batch fails, the reconciler's attempt succeeds
    Mock::given(method("PUT"))
        .and(path_regex(r"^/veil/api/routes/.+"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(3)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/veil/api/routes/.+"))
        .respond_with(success())
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    h.state.lifecycle.approve_api(listing.uid).await.unwrap();

    let updated = h
        .state
        .lifecycle
        .update_api(
            listing.uid,
            UpdateApiRequest {
                endpoint: Some("/v2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.gateway.is_drift());
    assert_eq!(updated.value.endpoint, "/v2");

    let report = h.state.reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.resolved, 1);
    assert!(h.repos.pending.list_due(10).await.unwrap().is_empty());
    let puts = received(&h.server, "PUT", "/veil/api/routes/").await;
    assert_eq!(puts.last().unwrap()["upstream"], "https://x.com/v2");
}

#[tokio::test]
async fn issued_key_reaches_gateway_for_active_api() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/veil/api/routes"))
        .respond_with(success())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/veil/api/keys"))
        .respond_with(success())
        .expect(1)
        .mount(&h.server)
        .await;

    let listing = h.state.lifecycle.create_api(create_request()).await.unwrap();
    h.state.lifecycle.approve_api(listing.uid).await.unwrap();
    let subscription = h
        .state
        .keys
        .create_subscription(
            serde_json::from_value(json!({ "api_uid": listing.uid, "user_id": Uuid::new_v4() }))
                .unwrap(),
        )
        .await
        .unwrap();

    let key = h
        .state
        .keys
        .create_key(
            subscription.id,
            serde_json::from_value(json!({ "name": "production" })).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(key.gateway, GatewaySync::Applied);
    let bodies = received(&h.server, "POST", "/veil/api/keys").await;
    assert_eq!(bodies[0]["path"], format!("/{}/*", listing.uid));
    assert_eq!(bodies[0]["api_keys"][0]["key"], key.value.key_value);
    assert_eq!(bodies[0]["api_keys"][0]["name"], "production");
}
