//! Shared fakes for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::gateway::{ControlPlane, ControlPlaneError, GatewayResponse};

type Responder =
    Box<dyn Fn(&Method, &str) -> Result<GatewayResponse, ControlPlaneError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Control plane that records every call and answers with a scripted result.
pub struct FakeControlPlane {
    calls: Mutex<Vec<RecordedCall>>,
    respond: Responder,
}

impl FakeControlPlane {
    pub fn responding<F>(respond: F) -> Self
    where
        F: Fn(&Method, &str) -> Result<GatewayResponse, ControlPlaneError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn succeeding() -> Self {
        Self::responding(|_, _| Ok(GatewayResponse::default()))
    }

    /// Every call fails the way an exhausted retry loop against a 503 would.
    pub fn failing() -> Self {
        Self::responding(|_, _| Err(exhausted(503)))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

pub fn exhausted(status: u16) -> ControlPlaneError {
    ControlPlaneError::Exhausted {
        attempts: 3,
        last: Box::new(ControlPlaneError::Status {
            status,
            message: "upstream unavailable".to_string(),
        }),
    }
}

pub fn rejected(status: u16) -> ControlPlaneError {
    ControlPlaneError::Status {
        status,
        message: format!("gateway answered {status}"),
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<GatewayResponse, ControlPlaneError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            path: path.to_string(),
            body,
        });
        (self.respond)(&method, path)
    }
}
