//! HTTP client for the gateway's administrative API.
//!
//! Every call gets a fixed timeout and is retried with exponential backoff when the gateway
//! could not be reached or answered with a 5xx. 4xx answers are returned on the first attempt.
//! The client keeps no state between calls, so a retried request may or may not have taken
//! effect on the gateway; the route helpers in [`super::service`] are written with that in mind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

use super::retry::{RetryPolicy, Sleeper};
use super::translator::RouteConfig;

/// Failure talking to the control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// The request did not complete within the configured timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// No HTTP response at all (connection refused, DNS, reset).
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// Non-2xx answer. The message comes from the body's `error` or `message` field.
    #[error("gateway returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// 2xx answer whose body reported `"status": "error"`.
    #[error("gateway rejected request: {0}")]
    Rejected(String),

    /// 2xx answer whose body could not be decoded.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Retries ran out; wraps the error of the final attempt.
    #[error("gateway call failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<ControlPlaneError>,
    },
}

impl ControlPlaneError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControlPlaneError::Timeout | ControlPlaneError::Transport(_) => true,
            ControlPlaneError::Status { status, .. } => *status >= 500,
            ControlPlaneError::Rejected(_)
            | ControlPlaneError::InvalidResponse(_)
            | ControlPlaneError::Exhausted { .. } => false,
        }
    }

    /// HTTP status of the final answer, if the gateway answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ControlPlaneError::Status { status, .. } => Some(*status),
            ControlPlaneError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            ControlPlaneError::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for ControlPlaneError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ControlPlaneError::Timeout;
        }

        ControlPlaneError::Transport(err.to_string())
    }
}

/// Body returned by every control-plane endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GatewayResponse {
    pub status: String,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub api: Option<Value>,
}

impl GatewayResponse {
    /// Route echoed back by the gateway, if it sent one in a shape we understand.
    pub fn route(&self) -> Option<RouteConfig> {
        self.api
            .as_ref()
            .and_then(|api| serde_json::from_value(api.clone()).ok())
    }
}

/// Transport to the control plane.
///
/// The production implementation is [`HttpControlPlane`]; tests substitute a mock.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ControlPlane: Send + Sync {
    /// Perform one logical call (possibly several attempts) against `path`.
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<GatewayResponse, ControlPlaneError>;
}

/// reqwest-backed control-plane client with timeout and retry.
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpControlPlane {
    /// Build a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ControlPlaneError::Transport` if the underlying HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, ControlPlaneError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            sleeper,
        })
    }

    async fn attempt(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<GatewayResponse, ControlPlaneError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        parse_response(status, &text)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<GatewayResponse, ControlPlaneError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.attempt(&method, path, body.as_ref()).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::debug!(%method, path, error = %err, "gateway call rejected");
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    %method,
                    path,
                    attempts = attempt,
                    error = %err,
                    "gateway call failed, retries exhausted"
                );
                return Err(ControlPlaneError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.backoff_for(attempt);
            tracing::warn!(
                %method,
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "gateway call failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Turn a raw gateway answer into a response or a classified error.
fn parse_response(status: StatusCode, text: &str) -> Result<GatewayResponse, ControlPlaneError> {
    if !status.is_success() {
        return Err(ControlPlaneError::Status {
            status: status.as_u16(),
            message: error_message(text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            }),
        });
    }

    if text.trim().is_empty() {
        return Ok(GatewayResponse {
            status: "success".to_string(),
            ..GatewayResponse::default()
        });
    }

    let parsed: GatewayResponse = serde_json::from_str(text)
        .map_err(|e| ControlPlaneError::InvalidResponse(e.to_string()))?;

    if parsed.status == "error" {
        let message = parsed
            .message
            .clone()
            .or_else(|| error_message(text))
            .unwrap_or_else(|| "unspecified error".to_string());
        return Err(ControlPlaneError::Rejected(message));
    }

    Ok(parsed)
}

/// Pull `error` (preferred) or `message` out of a JSON body, falling back to the raw text.
fn error_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(body) => ["error", "message"]
            .iter()
            .find_map(|field| body.get(field).and_then(Value::as_str))
            .map(str::to_string),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::retry::RetryPolicy;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn client(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> HttpControlPlane {
        HttpControlPlane::new(
            &server.uri(),
            Duration::from_secs(10),
            RetryPolicy::default(),
            sleeper,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn retries_server_errors_with_exponential_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/veil/api/routes"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "status": "error",
                "message": "upstream busy"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let err = client(&server, sleeper.clone())
            .perform(Method::POST, "/veil/api/routes", Some(json!({"path": "/a/*"})))
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("upstream busy"));
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn client_errors_fail_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "route not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let err = client(&server, sleeper.clone())
            .perform(Method::DELETE, "/veil/api/routes/%2Fa%2F*", None)
            .await
            .unwrap_err();

        match err {
            ControlPlaneError::Status { status, ref message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "route not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "updated"
            })))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let response = client(&server, sleeper.clone())
            .perform(Method::PUT, "/veil/api/keys/status", Some(json!({})))
            .await
            .unwrap();

        assert_eq!(response.message.as_deref(), Some("updated"));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn error_status_in_success_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"path": "/a/*", "api_keys": []})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "path already registered"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(RecordingSleeper::default()))
            .perform(
                Method::POST,
                "/veil/api/keys",
                Some(json!({"path": "/a/*", "api_keys": []})),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ControlPlaneError::Rejected(ref m) if m == "path already registered"));
    }

    #[tokio::test]
    async fn unreachable_gateway_exhausts_retries() {
        // Nothing listens on port 9 on the loopback interface.
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = HttpControlPlane::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            RetryPolicy::default(),
            sleeper.clone(),
        )
        .unwrap();

        let err = client
            .perform(Method::GET, "/veil/api/routes", None)
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert_eq!(err.status(), None);
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn slow_gateway_times_out_and_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/veil/api/routes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = HttpControlPlane::new(
            &server.uri(),
            Duration::from_millis(50),
            RetryPolicy::default(),
            sleeper.clone(),
        )
        .unwrap();

        let err = client
            .perform(Method::GET, "/veil/api/routes", None)
            .await
            .unwrap_err();

        match err {
            ControlPlaneError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ControlPlaneError::Timeout));
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn parse_response_prefers_error_field() {
        let err = parse_response(
            StatusCode::BAD_REQUEST,
            r#"{"error": "bad path", "message": "ignored"}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ControlPlaneError::Status { status: 400, ref message } if message == "bad path"));
    }

    #[test]
    fn parse_response_decodes_echoed_route() {
        let response = parse_response(
            StatusCode::CREATED,
            r#"{"status": "success", "message": "ok", "api": {
                "path": "/abc/*", "upstream": "https://x.com/v1",
                "required_subscription": "abc", "methods": ["GET"],
                "required_headers": [], "api_keys": []
            }}"#,
        )
        .unwrap();

        let route = response.route().unwrap();
        assert_eq!(route.path, "/abc/*");
        assert_eq!(route.api_uid(), Some("abc"));
    }

    #[test]
    fn retryable_classification() {
        assert!(ControlPlaneError::Timeout.is_retryable());
        assert!(ControlPlaneError::Transport("refused".into()).is_retryable());
        assert!(
            ControlPlaneError::Status {
                status: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ControlPlaneError::Status {
                status: 429,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ControlPlaneError::Rejected("nope".into()).is_retryable());
    }
}
