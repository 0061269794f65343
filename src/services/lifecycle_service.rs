//! Listing lifecycle and the gateway calls each step makes.
//!
//! # Gateway Coupling
//!
//! | Operation  | Gateway call                 | On gateway failure            |
//! |------------|------------------------------|-------------------------------|
//! | create     | none                         | -                             |
//! | approve    | register route (409: update) | abort, listing stays inactive |
//! | update     | update route, if routing changed and active | keep change, record drift |
//! | deactivate | unregister route             | persist `inactive` anyway     |
//! | delete     | unregister route, if active  | delete anyway                 |
//!
//! Approval is the only fail-closed step: it is what lets traffic reach a seller's upstream.

use url::Url;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::translator::normalize_methods;
use crate::gateway::{
    ControlPlaneError, GatewayError, GatewayService, RouteConfig, to_route_config,
};
use crate::models::api::{ApiListing, ApiStatus, CreateApiRequest, NewApi, UpdateApiRequest};
use crate::models::lifecycle::{InvalidTransition, Lifecycle, LifecycleAction};
use crate::models::sync::{GatewaySync, SyncReason, Synced};
use crate::repositories::Repositories;

use super::sync_policy::SyncPolicy;

const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Orchestrates listing state changes against the database and the gateway.
#[derive(Clone)]
pub struct LifecycleService {
    repos: Repositories,
    gateway: GatewayService,
    policy: SyncPolicy,
}

impl LifecycleService {
    pub fn new(repos: Repositories, gateway: GatewayService, policy: SyncPolicy) -> Self {
        Self {
            repos,
            gateway,
            policy,
        }
    }

    /// Store a new listing as `pending`. Nothing is sent to the gateway.
    pub async fn create_api(&self, request: CreateApiRequest) -> Result<ApiListing, AppError> {
        let methods = normalize_methods(&request.methods);
        validate_listing(&request.name, &request.endpoint, &request.base_url, &methods)?;

        let listing = self
            .repos
            .apis
            .create(NewApi {
                uid: Uuid::new_v4(),
                seller_id: request.seller_id,
                name: request.name.trim().to_string(),
                description: request.description,
                endpoint: request.endpoint,
                base_url: request.base_url,
                methods,
                required_headers: request.required_headers,
                is_public: request.is_public,
            })
            .await?;

        tracing::info!(api_uid = %listing.uid, seller_id = %listing.seller_id, "api created");

        Ok(listing)
    }

    pub async fn get_api(&self, uid: Uuid) -> Result<ApiListing, AppError> {
        self.repos
            .apis
            .get_by_uid(uid)
            .await?
            .ok_or(AppError::ApiNotFound)
    }

    /// Register the route, then flip the listing to `active`.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if the listing is already active
    /// - `Gateway` if the route could not be registered; the listing is left untouched
    /// - `Repository(Conflict)` if the listing changed state while the route was being
    ///   registered; the route is queued for reconciliation
    pub async fn approve_api(&self, uid: Uuid) -> Result<ApiListing, AppError> {
        let listing = self.get_api(uid).await?;
        self.activate(listing).await
    }

    async fn activate(&self, listing: ApiListing) -> Result<ApiListing, AppError> {
        let uid = listing.uid;
        let target = next_status(listing.status, LifecycleAction::Approve)?;

        if self.policy.gateway_known_down().await {
            tracing::warn!(api_uid = %uid, "approval refused, gateway unavailable");
            return Err(GatewayError::Unavailable.into());
        }

        let keys = self.repos.keys.list_for_api(listing.id).await?;
        let route = to_route_config(&listing, &keys);

        if let Err(e) = self.gateway.ensure_route(&route).await {
            tracing::error!(
                api_uid = %uid,
                attempts = e.cause().map_or(0, ControlPlaneError::attempts),
                error = %e,
                "approval aborted, route not registered"
            );
            return Err(e.into());
        }

        // The route is live from here on; a failed flip leaves drift behind
        match self
            .repos
            .apis
            .transition_status(uid, listing.status, target)
            .await
        {
            Ok(active) => {
                tracing::info!(api_uid = %uid, upstream = %route.upstream, "api approved");
                self.catch_up_keys(&active, &route).await;
                Ok(active)
            }
            Err(e) => {
                tracing::warn!(
                    api_uid = %uid,
                    error = %e,
                    "route registered but status flip failed"
                );
                self.policy
                    .remember(uid, SyncReason::ApprovalRace, Some(&e.to_string()))
                    .await;
                Err(e.into())
            }
        }
    }

    /// Push keys issued between the route snapshot and the status flip.
    ///
    /// Such keys saw a non-active listing and were not synced on their own.
    async fn catch_up_keys(&self, active: &ApiListing, registered: &RouteConfig) {
        let keys = match self.repos.keys.list_for_api(active.id).await {
            Ok(keys) => keys,
            Err(e) => {
                self.policy
                    .remember(active.uid, SyncReason::ApprovalRace, Some(&e.to_string()))
                    .await;
                return;
            }
        };

        let route = to_route_config(active, &keys);
        if route.api_keys == registered.api_keys {
            return;
        }

        tracing::warn!(
            api_uid = %active.uid,
            registered = registered.api_keys.len(),
            current = route.api_keys.len(),
            "keys changed during approval, updating route"
        );
        self.policy
            .best_effort(
                active.uid,
                SyncReason::ApprovalRace,
                self.gateway.update_route(&route),
            )
            .await;
    }

    /// Persist an edit and, for an active listing whose routing changed, push it to the gateway.
    pub async fn update_api(
        &self,
        uid: Uuid,
        request: UpdateApiRequest,
    ) -> Result<Synced<ApiListing>, AppError> {
        let current = self.get_api(uid).await?;
        let status = next_status(current.status, LifecycleAction::Update)?;

        let mut proposed = request.applied_to(&current);
        proposed.status = status;
        proposed.name = proposed.name.trim().to_string();
        proposed.methods = normalize_methods(&proposed.methods);
        validate_listing(
            &proposed.name,
            &proposed.endpoint,
            &proposed.base_url,
            &proposed.methods,
        )?;

        let saved = self.repos.apis.update_details(&proposed).await?;

        if !saved.is_active() || !current.routing_differs(&saved) {
            return Ok(Synced::new(saved, GatewaySync::Skipped));
        }

        let keys = self.repos.keys.list_for_api(saved.id).await?;
        let route = to_route_config(&saved, &keys);
        let sync = self
            .policy
            .best_effort(uid, SyncReason::RouteUpdate, self.gateway.update_route(&route))
            .await;

        if sync == GatewaySync::Applied {
            tracing::info!(api_uid = %uid, upstream = %route.upstream, "route updated");
        }

        Ok(Synced::new(saved, sync))
    }

    /// Unregister the route and persist `inactive`, whatever the gateway said.
    pub async fn deactivate_api(&self, uid: Uuid) -> Result<Synced<ApiListing>, AppError> {
        let listing = self.get_api(uid).await?;
        let target = next_status(listing.status, LifecycleAction::Deactivate)?;

        let uid_str = uid.to_string();
        let sync = self
            .policy
            .best_effort(
                uid,
                SyncReason::RouteRemoval,
                self.gateway.unregister_route(&uid_str),
            )
            .await;

        let inactive = self
            .repos
            .apis
            .transition_status(uid, listing.status, target)
            .await?;

        tracing::info!(api_uid = %uid, gateway = ?sync, "api deactivated");

        Ok(Synced::new(inactive, sync))
    }

    /// Delete the listing, taking its route down first if it was live.
    pub async fn delete_api(&self, uid: Uuid) -> Result<Synced<()>, AppError> {
        let listing = self.get_api(uid).await?;
        let Lifecycle::Deleted = listing.status.apply(LifecycleAction::Delete)? else {
            return Err(InvalidTransition {
                from: listing.status,
                action: LifecycleAction::Delete,
            }
            .into());
        };

        let sync = if listing.is_active() {
            let uid_str = uid.to_string();
            self.policy
                .best_effort(
                    uid,
                    SyncReason::RouteRemoval,
                    self.gateway.unregister_route(&uid_str),
                )
                .await
        } else {
            GatewaySync::Skipped
        };

        self.repos.apis.delete(uid).await?;

        tracing::info!(api_uid = %uid, gateway = ?sync, "api deleted");

        Ok(Synced::new((), sync))
    }
}

/// Status the transition table stores for `action`.
fn next_status(from: ApiStatus, action: LifecycleAction) -> Result<ApiStatus, AppError> {
    match from.apply(action)? {
        Lifecycle::Stored(to) => Ok(to),
        Lifecycle::Deleted => Err(InvalidTransition { from, action }.into()),
    }
}

/// Reject listings the gateway could not route.
fn validate_listing(
    name: &str,
    endpoint: &str,
    base_url: &str,
    methods: &[String],
) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }

    if methods.is_empty() {
        return Err(AppError::InvalidRequest(
            "at least one HTTP method is required".to_string(),
        ));
    }
    if let Some(method) = methods
        .iter()
        .find(|m| !ALLOWED_METHODS.contains(&m.as_str()))
    {
        return Err(AppError::InvalidRequest(format!(
            "unsupported HTTP method: {method}"
        )));
    }

    // An absolute endpoint replaces the base URL entirely
    let upstream = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint
    } else {
        base_url
    };
    match Url::parse(upstream) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::InvalidRequest(format!(
            "invalid upstream URL: {upstream}"
        ))),
    }
}
