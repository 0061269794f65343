//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.
//!
//! Everything the gateway layer needs (admin URL, public URL, retry policy, timeouts) is read
//! here once at startup and handed to the components that use it.

use std::time::Duration;

use serde::Deserialize;

use crate::gateway::RetryPolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `GATEWAY_URL` (optional): gateway admin API origin, defaults to `http://localhost:8080`
/// - `GATEWAY_PUBLIC_URL` (optional): origin consumers call, defaults to `GATEWAY_URL`
/// - `GATEWAY_TIMEOUT_SECS` (optional): per-request timeout, defaults to 10
/// - `GATEWAY_MAX_ATTEMPTS` (optional): attempts per call, defaults to 3
/// - `GATEWAY_BACKOFF_BASE_MS` (optional): first retry delay, defaults to 1000
/// - `GATEWAY_BACKOFF_JITTER` (optional): randomize retry delays, defaults to false
/// - `GATEWAY_HEALTH_TIMEOUT_SECS` (optional): liveness probe timeout, defaults to 5
/// - `GATEWAY_FAST_FAIL` (optional): consult the probe before gateway calls, defaults to false
/// - `RECONCILE_INTERVAL_SECS` (optional): seconds between reconciliation passes, defaults to 60
/// - `RECONCILE_BATCH_SIZE` (optional): pending syncs handled per pass, defaults to 50
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default)]
    pub gateway_public_url: Option<String>,

    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_gateway_max_attempts")]
    pub gateway_max_attempts: u32,

    #[serde(default = "default_gateway_backoff_base_ms")]
    pub gateway_backoff_base_ms: u64,

    #[serde(default)]
    pub gateway_backoff_jitter: bool,

    #[serde(default = "default_gateway_health_timeout_secs")]
    pub gateway_health_timeout_secs: u64,

    #[serde(default)]
    pub gateway_fast_fail: bool,

    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_gateway_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

fn default_gateway_max_attempts() -> u32 {
    3
}

fn default_gateway_backoff_base_ms() -> u64 {
    1000
}

fn default_gateway_health_timeout_secs() -> u64 {
    5
}

fn default_reconcile_interval_secs() -> u64 {
    60
}

fn default_reconcile_batch_size() -> i64 {
    50
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: gateway_url -> GATEWAY_URL
        envy::from_env::<Config>()
    }

    /// Origin that consumers use to reach published APIs.
    pub fn public_gateway_url(&self) -> String {
        self.gateway_public_url
            .clone()
            .unwrap_or_else(|| self.gateway_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_health_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    /// Retry policy for every control-plane call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.gateway_max_attempts.max(1),
            base_delay: Duration::from_millis(self.gateway_backoff_base_ms),
            jitter: self.gateway_backoff_jitter,
        }
    }
}
