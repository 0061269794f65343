//! Gateway control-plane integration.
//!
//! - [`client`]: retrying HTTP transport to the admin API
//! - [`translator`]: listing/key to route schema mapping
//! - [`service`]: route and key operations with operation-level errors
//! - [`health`]: liveness probe

pub mod client;
pub mod health;
pub mod retry;
pub mod service;
pub mod translator;

pub use client::{ControlPlane, ControlPlaneError, GatewayResponse, HttpControlPlane};
pub use health::{HealthCheck, HealthProbe};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use service::{GatewayError, GatewayService};
pub use translator::{GatewayKey, RouteConfig, to_route_config};
