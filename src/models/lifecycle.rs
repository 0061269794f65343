//! API listing lifecycle.
//!
//! ```text
//!   Pending --approve--> Active --deactivate--> Inactive
//!                          ^  \                    |
//!                          |   update (self)       |
//!                          +-------approve---------+
//!
//!   any --delete--> Deleted
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted lifecycle state. `Deleted` is never stored; the row is removed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Pending,
    Active,
    Inactive,
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Pending => "pending",
            ApiStatus::Active => "active",
            ApiStatus::Inactive => "inactive",
        }
    }

    /// Whether the listing should be routable at the gateway.
    pub fn is_active(&self) -> bool {
        matches!(self, ApiStatus::Active)
    }

    /// Apply an action, returning the resulting state or rejecting the transition.
    pub fn apply(self, action: LifecycleAction) -> Result<Lifecycle, InvalidTransition> {
        use ApiStatus::*;
        use LifecycleAction::*;

        match (self, action) {
            (Pending | Inactive, Approve) => Ok(Lifecycle::Stored(Active)),
            (status, Update) => Ok(Lifecycle::Stored(status)),
            (Active, Deactivate) => Ok(Lifecycle::Stored(Inactive)),
            (_, Delete) => Ok(Lifecycle::Deleted),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown api status '{0}'")]
pub struct ParseStatusError(String);

impl TryFrom<String> for ApiStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ApiStatus::Pending),
            "active" => Ok(ApiStatus::Active),
            "inactive" => Ok(ApiStatus::Inactive),
            _ => Err(ParseStatusError(value)),
        }
    }
}

/// Requested lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Approve,
    Update,
    Deactivate,
    Delete,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleAction::Approve => "approve",
            LifecycleAction::Update => "update",
            LifecycleAction::Deactivate => "deactivate",
            LifecycleAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stored(ApiStatus),
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} an api in state '{from}'")]
pub struct InvalidTransition {
    pub from: ApiStatus,
    pub action: LifecycleAction,
}
