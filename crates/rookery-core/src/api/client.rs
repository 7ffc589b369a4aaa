//! API client for the Rookery backend.
//!
//! This module provides the `ApiClient` struct, the single entry point for
//! outbound requests. Every request goes through the same pipeline: attach
//! the current bearer credential, dispatch with a bounded retry policy for
//! transient failures, and absorb authentication failures by renewing the
//! session once and replaying the original request. When renewal is
//! impossible the session is torn down and the failing response handed back,
//! so callers never loop on an expired credential.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::access::AccessControl;
use crate::auth::principal::Principal;
use crate::auth::renewal::RenewalCoordinator;
use crate::auth::session::SessionMonitor;
use crate::auth::storage::{SessionStorage, StorageError};
use crate::auth::store::{TokenPair, TokenStore};
use crate::config::Config;

use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse};
use super::transport::{HttpTransport, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of automatic retries for a retryable response.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds between retries.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Statuses worth retrying automatically: request timeout, rate limiting,
/// and transient server-side failures.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Wire shape of a successful login - internal only
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    user: Principal,
}

/// Authenticated API client for Rookery.
/// Clone is cheap - the transport, store, and coordinator are shared handles.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    renewal: RenewalCoordinator,
    monitor: SessionMonitor,
    config: Arc<Config>,
}

impl ApiClient {
    /// Create a client over the production HTTP transport.
    pub fn new(config: Config, storage: Arc<dyn SessionStorage>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_transport(Arc::new(transport), config, storage))
    }

    /// Create a client over a caller-supplied transport. Used by tests and
    /// instrumented builds; everything above the transport behaves the same.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: Config,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenStore::new(storage));
        let renewal = RenewalCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            Arc::clone(&config),
        );
        Self {
            transport,
            tokens,
            renewal,
            monitor: SessionMonitor::default(),
            config,
        }
    }

    /// Rehydrate a persisted session, marking the session active when a
    /// credential pair was found. Call once at startup.
    pub fn restore_session(&self) -> Result<bool, StorageError> {
        let restored = self.tokens.load()?;
        if restored {
            self.monitor.activate();
        }
        Ok(restored)
    }

    /// The credential store backing this client.
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Session lifecycle signal; subscribe to react to sign-out.
    pub fn session(&self) -> &SessionMonitor {
        &self.monitor
    }

    /// Capability oracle over this client's session.
    pub fn access(&self) -> AccessControl {
        AccessControl::new(Arc::clone(&self.tokens))
    }

    // ===== Request pipeline =====

    /// Send a request through the full pipeline.
    ///
    /// The response comes back with whatever status the backend produced;
    /// only transport-level failures surface as `Err`. An authentication
    /// failure is absorbed by renewing the session and replaying the request
    /// once. When renewal fails the session is torn down and the original
    /// failing response returned, so the caller can wind down like any other
    /// error path.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.dispatch(&request).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // A rejected renewal exchange must never trigger another renewal.
        if self.is_renewal_request(&request) {
            warn!("Renewal endpoint rejected its own credential, tearing down session");
            self.teardown();
            return Ok(response);
        }

        debug!(path = %request.path, "Authentication failure, renewing session");
        match self.renewal.renew().await {
            Ok(_) => {
                // Replay exactly once with the fresh credential; the replay's
                // status is final and is not inspected for 401 again.
                self.dispatch(&request).await
            }
            Err(e) => {
                info!(error = %e, "Session renewal failed, signing out");
                self.teardown();
                Ok(response)
            }
        }
    }

    /// One attachment + dispatch cycle with the bounded retry policy.
    ///
    /// The bearer is read fresh from the store on every attempt, so a replay
    /// (or a retry racing a renewal) always carries the newest credential.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.config.endpoint_url(&request.path);
        let mut attempts = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let prepared = self.attach_credential(request)?;
            let response = self.transport.execute(&url, &prepared).await?;

            if is_retryable_status(response.status) && request.is_idempotent() {
                attempts += 1;
                if attempts > MAX_RETRY_ATTEMPTS {
                    debug!(url = %url, status = %response.status, "Retry budget exhausted");
                    return Ok(response);
                }
                warn!(url = %url, status = %response.status, retry = attempts, backoff_ms = backoff_ms, "Transient failure, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            return Ok(response);
        }
    }

    fn attach_credential(&self, request: &ApiRequest) -> Result<ApiRequest, ApiError> {
        match self.tokens.access_token() {
            Some(token) => request.with_bearer(&token),
            None => Ok(request.clone()),
        }
    }

    fn is_renewal_request(&self, request: &ApiRequest) -> bool {
        request.path == self.config.renewal_path
    }

    /// Clear the session and broadcast the sign-out. Safe to call twice;
    /// the monitor collapses redundant signals.
    fn teardown(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear persisted session during teardown");
        }
        self.monitor.sign_out();
    }

    // ===== Typed helpers =====

    /// GET a JSON resource, classifying non-success statuses into `ApiError`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::get(path)).await?;
        Self::decode(response)
    }

    /// POST a JSON body and decode a JSON reply.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::post(path).json(body)?).await?;
        Self::decode(response)
    }

    /// PUT a JSON body and decode a JSON reply.
    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::put(path).json(body)?).await?;
        Self::decode(response)
    }

    /// DELETE a resource and decode a JSON reply.
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::delete(path)).await?;
        Self::decode(response)
    }

    fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        response.json()
    }

    // ===== Account endpoints =====

    /// Authenticate and establish a session.
    ///
    /// Goes straight to the transport: there is no credential to attach, and
    /// a 401 here means bad login rather than an expired session, so the
    /// renewal machinery must stay out of the way.
    pub async fn login(&self, username: &str, password: &str) -> Result<Principal, ApiError> {
        let mut request = ApiRequest::post(self.config.login_path.as_str());
        request.body = Some(serde_json::json!({
            "username": username,
            "password": password,
        }));

        let url = self.config.endpoint_url(&self.config.login_path);
        let response = self.transport.execute(&url, &request).await?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        let login: LoginResponse = response.json()?;

        let persisted = self
            .tokens
            .set(TokenPair::new(login.access_token, login.refresh_token))
            .and_then(|_| self.tokens.set_principal(Some(login.user.clone())));
        if let Err(e) = persisted {
            warn!(error = %e, "Session established but could not be persisted");
        }
        self.monitor.activate();
        info!(user = %login.user.name, "Logged in");
        Ok(login.user)
    }

    /// End the session: best-effort server-side revocation, then local
    /// teardown. Local state is cleared even when the server call fails.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.config.logout_path.as_str());
        match self.dispatch(&request).await {
            Ok(response) if !response.is_success() => {
                debug!(status = %response.status, "Logout request rejected");
            }
            Err(e) => {
                debug!(error = %e, "Logout request did not complete");
            }
            Ok(_) => {}
        }
        self.teardown();
    }

    /// Re-fetch the authenticated principal and store it.
    ///
    /// Renewal refreshes only the token pair; call this afterward when the
    /// displayed identity or role may have changed server-side.
    pub async fn fetch_profile(&self) -> Result<Principal, ApiError> {
        let principal: Principal = self.get_json(&self.config.profile_path).await?;
        if let Err(e) = self.tokens.set_principal(Some(principal.clone())) {
            warn!(error = %e, "Profile fetched but could not be persisted");
        }
        Ok(principal)
    }
}
