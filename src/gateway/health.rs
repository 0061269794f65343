//! Gateway liveness probe.

use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::translator::HEALTH_PATH;

/// Answers "is the gateway up right now".
#[async_trait]
#[cfg_attr(test, automock)]
pub trait HealthCheck: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

/// Single GET against the gateway's `/health` endpoint with a short timeout.
///
/// Never retries and never errors: anything other than a 2xx within the timeout is `false`.
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH),
        })
    }
}

#[async_trait]
impl HealthCheck for HealthProbe {
    async fn is_healthy(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "gateway health probe failed");
                false
            }
        }
    }
}
