//! Single-flight credential renewal.
//!
//! Any number of in-flight requests can discover an expired credential at
//! the same moment. The coordinator collapses them onto one renewal exchange
//! and fans the outcome out to every waiter, so the renewal endpoint sees a
//! single call per expiry no matter how busy the client is.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::request::ApiRequest;
use crate::api::transport::{Transport, TransportError};
use crate::config::Config;

use super::store::{TokenPair, TokenStore};

/// Renewal failure, cloneable so one outcome can fan out to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// No refresh token on hand; resolved without a network call.
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Renewal request failed: {0}")]
    Transport(#[from] TransportError),

    /// The renewal endpoint answered with a non-success status.
    #[error("Renewal rejected with status {0}")]
    Rejected(u16),

    #[error("Renewal response could not be parsed: {0}")]
    InvalidResponse(String),

    /// The renewal task was cancelled or panicked before settling.
    #[error("Renewal interrupted")]
    Interrupted,
}

/// Wire shape of a successful renewal response - internal only
#[derive(Debug, Deserialize)]
struct RenewalResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

type SharedRenewal = Shared<BoxFuture<'static, Result<TokenPair, RenewalError>>>;

/// Collapses concurrent renewal triggers onto a single exchange.
/// Clone is cheap - clones share the same in-flight slot.
///
/// The slot is the only synchronization point: finding it occupied means
/// subscribing to the pending outcome, and installing a new exchange happens
/// under the same lock acquisition, so two callers can never both start one.
#[derive(Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    config: Arc<Config>,
    in_flight: Mutex<Option<SharedRenewal>>,
}

impl RenewalCoordinator {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<TokenStore>, config: Arc<Config>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                config,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Obtain a fresh token pair, sharing any renewal already in flight.
    ///
    /// Exactly one exchange reaches the network per settled cycle no matter
    /// how many tasks call this concurrently, and all of them observe the
    /// same outcome. The exchange runs on its own task, so it completes even
    /// if every waiter is cancelled mid-flight.
    pub async fn renew(&self) -> Result<TokenPair, RenewalError> {
        let pending = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Renewal already in flight, subscribing to its outcome");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(inner.execute());
                    let pending: SharedRenewal = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(RenewalError::Interrupted),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }
}

impl Inner {
    /// Runs the exchange, settles the store, then releases the slot.
    ///
    /// The slot is cleared only after the outcome (including the store
    /// write) is final. Waiters each hold their own handle on the shared
    /// result, so clearing cannot drop it from under them; a caller that
    /// arrives after the clear starts a fresh cycle against the new state.
    async fn execute(self: Arc<Self>) -> Result<TokenPair, RenewalError> {
        let outcome = match self.store.get() {
            Some(current) if !current.refresh.is_empty() => {
                let outcome = self.exchange(&current.refresh).await;
                if let Ok(ref pair) = outcome {
                    // A teardown or a fresh login that landed mid-exchange
                    // wins; the renewed pair goes in only while the refresh
                    // token that initiated this exchange is still current.
                    match self.store.set_if_refresh_matches(&current.refresh, pair.clone()) {
                        Ok(true) => info!("Credential pair renewed"),
                        Ok(false) => {
                            info!("Session changed during renewal, discarding renewed pair")
                        }
                        // In-memory tokens are already current; losing
                        // durability only costs a re-login after restart.
                        Err(e) => warn!(error = %e, "Renewed session could not be persisted"),
                    }
                }
                outcome
            }
            _ => {
                debug!("Renewal requested with no stored refresh token");
                Err(RenewalError::NoRefreshToken)
            }
        };
        if let Err(ref e) = outcome {
            // Policy (teardown or surface) belongs to the pipeline; the
            // coordinator only reports.
            warn!(error = %e, "Credential renewal failed");
        }
        *self.in_flight.lock() = None;
        outcome
    }

    async fn exchange(&self, refresh: &str) -> Result<TokenPair, RenewalError> {
        let mut request = ApiRequest::post(self.config.renewal_path.as_str());
        request.body = Some(serde_json::json!({ "refreshToken": refresh }));

        let url = self.config.endpoint_url(&self.config.renewal_path);
        let response = self.transport.execute(&url, &request).await?;

        if !response.status.is_success() {
            return Err(RenewalError::Rejected(response.status.as_u16()));
        }

        let parsed: RenewalResponse = serde_json::from_str(&response.body).map_err(|e| {
            RenewalError::InvalidResponse(format!("Failed to parse renewal response: {e}"))
        })?;
        Ok(TokenPair::new(parsed.access_token, parsed.refresh_token))
    }
}
