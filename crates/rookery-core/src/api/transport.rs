//! HTTP transport edge.
//!
//! [`Transport`] is the seam between the pipeline and the network. Production
//! code goes through [`HttpTransport`] (reqwest); tests script a mock and
//! exercise the whole pipeline without a server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::request::{ApiRequest, ApiResponse};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Failure before any response was received.
///
/// Kept apart from status-level errors on purpose: the pipeline never renews
/// credentials off one of these, it surfaces them directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Performs one HTTP exchange. `url` is absolute; credential attachment and
/// retry policy live in the pipeline, not here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, url: &str, request: &ApiRequest)
        -> Result<ApiResponse, TransportError>;
}

/// Production transport over a pooled reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(status = %status, url = url, "Response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for pipeline and coordinator tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use reqwest::header::{HeaderMap, AUTHORIZATION};
    use reqwest::StatusCode;
    use tokio::time::sleep;

    use super::*;
    use crate::auth::store::TokenPair;

    #[derive(Clone)]
    enum RenewalReply {
        Success(TokenPair),
        Status(u16),
        Malformed,
        Fail(TransportError),
    }

    /// One scripted non-renewal reply, consumed in order.
    #[derive(Clone)]
    struct ScriptedReply {
        status: u16,
        body: String,
    }

    /// In-memory stand-in for the backend.
    ///
    /// Requests to `renewal_path` follow the configured [`RenewalReply`];
    /// everything else either pops a scripted reply or falls back to a
    /// bearer check against the currently valid token.
    pub(crate) struct MockTransport {
        renewal_path: String,
        /// When `Some`, data endpoints require this bearer; `None` accepts any.
        valid_token: Mutex<Option<String>>,
        renewal_reply: Mutex<RenewalReply>,
        renewal_delay: Mutex<Duration>,
        data_script: Mutex<VecDeque<ScriptedReply>>,
        data_failure: Mutex<Option<TransportError>>,
        renewal_calls: AtomicUsize,
        data_calls: AtomicUsize,
        /// Authorization headers observed on data requests, in arrival order.
        pub seen_bearers: Mutex<Vec<Option<String>>>,
        /// Bodies sent to the renewal endpoint.
        pub renewal_bodies: Mutex<Vec<Option<serde_json::Value>>>,
    }

    impl MockTransport {
        pub fn new(renewal_path: &str) -> Arc<Self> {
            Arc::new(Self {
                renewal_path: renewal_path.to_string(),
                valid_token: Mutex::new(None),
                renewal_reply: Mutex::new(RenewalReply::Status(400)),
                renewal_delay: Mutex::new(Duration::ZERO),
                data_script: Mutex::new(VecDeque::new()),
                data_failure: Mutex::new(None),
                renewal_calls: AtomicUsize::new(0),
                data_calls: AtomicUsize::new(0),
                seen_bearers: Mutex::new(Vec::new()),
                renewal_bodies: Mutex::new(Vec::new()),
            })
        }

        pub fn require_bearer(&self, token: &str) {
            *self.valid_token.lock() = Some(token.to_string());
        }

        pub fn renewal_succeeds_with(&self, pair: TokenPair) {
            *self.renewal_reply.lock() = RenewalReply::Success(pair);
        }

        pub fn renewal_fails_with_status(&self, status: u16) {
            *self.renewal_reply.lock() = RenewalReply::Status(status);
        }

        pub fn renewal_returns_garbage(&self) {
            *self.renewal_reply.lock() = RenewalReply::Malformed;
        }

        pub fn renewal_fails_with(&self, error: TransportError) {
            *self.renewal_reply.lock() = RenewalReply::Fail(error);
        }

        pub fn set_renewal_delay(&self, delay: Duration) {
            *self.renewal_delay.lock() = delay;
        }

        pub fn script_data_statuses(&self, statuses: &[u16]) {
            let mut script = self.data_script.lock();
            for &status in statuses {
                script.push_back(ScriptedReply {
                    status,
                    body: "{}".to_string(),
                });
            }
        }

        pub fn script_data_reply(&self, status: u16, body: &str) {
            self.data_script.lock().push_back(ScriptedReply {
                status,
                body: body.to_string(),
            });
        }

        pub fn fail_data_with(&self, error: TransportError) {
            *self.data_failure.lock() = Some(error);
        }

        pub fn renewal_call_count(&self) -> usize {
            self.renewal_calls.load(Ordering::SeqCst)
        }

        pub fn data_call_count(&self) -> usize {
            self.data_calls.load(Ordering::SeqCst)
        }

        fn reply(status: u16, body: &str) -> ApiResponse {
            ApiResponse {
                status: StatusCode::from_u16(status).expect("valid status code"),
                headers: HeaderMap::new(),
                body: body.to_string(),
            }
        }

        async fn handle_renewal(
            &self,
            request: &ApiRequest,
        ) -> Result<ApiResponse, TransportError> {
            self.renewal_calls.fetch_add(1, Ordering::SeqCst);
            self.renewal_bodies.lock().push(request.body.clone());

            let delay = *self.renewal_delay.lock();
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let reply = self.renewal_reply.lock().clone();
            match reply {
                RenewalReply::Success(pair) => {
                    // Replays carrying the renewed token must pass.
                    *self.valid_token.lock() = Some(pair.access.clone());
                    let body = serde_json::json!({
                        "accessToken": pair.access,
                        "refreshToken": pair.refresh,
                    });
                    Ok(Self::reply(200, &body.to_string()))
                }
                RenewalReply::Status(status) => {
                    Ok(Self::reply(status, r#"{"error":"invalid_grant"}"#))
                }
                RenewalReply::Malformed => Ok(Self::reply(200, "definitely not json")),
                RenewalReply::Fail(error) => Err(error),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(
            &self,
            _url: &str,
            request: &ApiRequest,
        ) -> Result<ApiResponse, TransportError> {
            if request.path == self.renewal_path {
                return self.handle_renewal(request).await;
            }

            self.data_calls.fetch_add(1, Ordering::SeqCst);
            let bearer = request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            self.seen_bearers.lock().push(bearer.clone());

            let failure = self.data_failure.lock().clone();
            if let Some(error) = failure {
                return Err(error);
            }

            let scripted = self.data_script.lock().pop_front();
            if let Some(reply) = scripted {
                return Ok(Self::reply(reply.status, &reply.body));
            }

            let authorized = match self.valid_token.lock().as_deref() {
                Some(token) => bearer.as_deref() == Some(format!("Bearer {}", token).as_str()),
                None => true,
            };
            if authorized {
                Ok(Self::reply(200, r#"{"ok":true}"#))
            } else {
                Ok(Self::reply(401, r#"{"error":"unauthorized"}"#))
            }
        }
    }
}
