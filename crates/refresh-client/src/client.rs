//! Client facade
//!
//! Composes the executor, classifier, coordinator, and credential store
//! into the object callers use. Stamps the active bearer token on every
//! outgoing request, recovers `token.expired` failures through single-flight
//! refresh and replay, and applies the session-context policy when recovery
//! is not possible.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use session_auth::{
    ACCESS_TOKEN_NAME, CredentialStore, DEFAULT_SCOPE, REFRESH_PATH, REFRESH_TOKEN_NAME,
    Credentials, RefreshRequest, RefreshResponse, Token, WriteOptions,
};

use crate::classify::{FailureClass, classify};
use crate::context::SessionContext;
use crate::coordinator::{Admission, RefreshCoordinator};
use crate::error::{Error, Result};
use crate::executor::{ApiFailure, ApiRequest, ApiResponse, ExecuteError, Executor, HttpExecutor};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upstream base URL, e.g. `http://localhost:3333`.
    pub base_url: String,
    /// Relative path of the refresh endpoint.
    pub refresh_path: String,
    /// Path scope used when reading and writing the credential store.
    pub scope: String,
    /// Retention applied when persisting refreshed credentials.
    pub write_options: WriteOptions,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
    /// Bounded wait for a request parked behind an in-flight refresh.
    pub queue_wait: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: REFRESH_PATH.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            write_options: WriteOptions::default(),
            request_timeout: Duration::from_secs(30),
            queue_wait: Duration::from_secs(30),
        }
    }

    pub fn queue_wait(mut self, wait: Duration) -> Self {
        self.queue_wait = wait;
        self
    }
}

/// HTTP client with transparent expired-credential recovery.
///
/// Each instance owns its refresh state. Server-rendering code must build
/// one client per incoming request so one user's refresh cycle can never
/// settle another user's requests.
pub struct Client {
    executor: Arc<dyn Executor>,
    store: Arc<dyn CredentialStore>,
    context: SessionContext,
    config: ClientConfig,
    coordinator: RefreshCoordinator,
    /// Currently active access token, stamped on every new request.
    access: RwLock<Option<Token>>,
}

impl Client {
    /// Build a client backed by a reqwest executor, seeding the active
    /// token from the store.
    pub async fn new(
        config: ClientConfig,
        context: SessionContext,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let executor = HttpExecutor::new(config.base_url.clone(), config.request_timeout)
            .map_err(|e| Error::Transport(e.to_string()))?;
        Self::with_executor(Arc::new(executor), config, context, store).await
    }

    /// Build a client over a caller-supplied executor.
    pub async fn with_executor(
        executor: Arc<dyn Executor>,
        config: ClientConfig,
        context: SessionContext,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let stored = store.read(&config.scope).await?;
        Ok(Self {
            executor,
            store,
            context,
            config,
            coordinator: RefreshCoordinator::new(),
            access: RwLock::new(stored.access_token),
        })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Issue a request with the active bearer token.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        let mut request = ApiRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.send(request).await
    }

    /// Issue a fully built request, recovering a `token.expired` 401
    /// transparently. Any other failure is surfaced unchanged.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let stamped = self.stamp(request.clone()).await;
        match self.executor.execute(stamped).await {
            Ok(response) => Ok(response),
            Err(ExecuteError::Transport(e)) => Err(Error::Transport(e)),
            Err(ExecuteError::Upstream(failure)) => match classify(&failure) {
                FailureClass::PassThrough => Err(Error::Upstream(failure)),
                FailureClass::Unrecoverable => Err(self.unrecoverable(failure).await),
                FailureClass::ExpiredRetry => self.recover_expired(request, failure).await,
            },
        }
    }

    /// Stamp the active bearer token, if any, onto the request.
    async fn stamp(&self, request: ApiRequest) -> ApiRequest {
        match self.access.read().await.as_ref() {
            Some(token) => request.with_bearer(token.expose()),
            None => request,
        }
    }

    /// Apply the failure policy to a 401 that is not recoverable by refresh.
    async fn unrecoverable(&self, failure: ApiFailure) -> Error {
        warn!(
            status = failure.status,
            code = failure.code(),
            "unrecoverable authorization failure"
        );
        match &self.context {
            SessionContext::Interactive(sign_out) => {
                sign_out.sign_out().await;
                Error::Upstream(failure)
            }
            SessionContext::Server => Error::Credential,
        }
    }

    /// Recover a request that failed with the expiry sentinel: become the
    /// refresh leader or park behind the in-flight refresh, then replay the
    /// original request once with the fresh token.
    async fn recover_expired(
        &self,
        request: ApiRequest,
        failure: ApiFailure,
    ) -> Result<ApiResponse> {
        match self.coordinator.admit(&request.method, &request.path).await {
            Admission::Leader => {
                metrics::counter!("token_refresh_total").increment(1);
                match self.run_refresh().await {
                    Ok(access) => {
                        self.coordinator.settle_success(&access).await;
                        self.replay(request, &access).await
                    }
                    Err(reason) => {
                        metrics::counter!("token_refresh_failures_total").increment(1);
                        warn!(reason = %reason, "token refresh failed");
                        self.coordinator.settle_failure(&reason).await;
                        if let SessionContext::Interactive(sign_out) = &self.context {
                            sign_out.sign_out().await;
                        }
                        Err(self.refresh_failed(failure))
                    }
                }
            }
            Admission::Queued(rx) => {
                metrics::counter!("requests_queued_total").increment(1);
                match timeout(self.config.queue_wait, rx).await {
                    // Refresh still in flight after the bounded wait
                    Err(_) => Err(Error::RefreshTimeout),
                    // Leader went away without settling the queue
                    Ok(Err(_)) => Err(Error::RefreshTimeout),
                    Ok(Ok(Ok(access))) => self.replay(request, &access).await,
                    Ok(Ok(Err(reason))) => {
                        debug!(reason = %reason, "parked request rejected by failed refresh");
                        Err(self.refresh_failed(failure))
                    }
                }
            }
        }
    }

    /// Issue the one refresh call for this cycle.
    ///
    /// Reads the refresh token fresh from the store (another facade sharing
    /// the store may have rotated it since this request was built), persists
    /// the issued pair, and swaps the active token so new requests pick it
    /// up immediately. Returns the failure reason as a string so the caller
    /// can both broadcast it to the queue and log it once.
    async fn run_refresh(&self) -> std::result::Result<Token, String> {
        let stored = self
            .store
            .read(&self.config.scope)
            .await
            .map_err(|e| format!("reading credential store: {e}"))?;
        let refresh_token = stored
            .refresh_token
            .ok_or_else(|| "no refresh token in store".to_string())?;

        debug!(path = %self.config.refresh_path, "issuing token refresh");
        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| format!("encoding refresh request: {e}"))?;
        let request = ApiRequest::new(Method::POST, self.config.refresh_path.clone()).with_body(body);

        let response = match self.executor.execute(request).await {
            Ok(response) => response,
            Err(ExecuteError::Upstream(f)) => {
                return Err(format!("refresh endpoint returned {}", f.status));
            }
            Err(ExecuteError::Transport(e)) => return Err(format!("refresh request failed: {e}")),
        };

        let issued: RefreshResponse = response
            .json()
            .map_err(|e| format!("invalid refresh response: {e}"))?;
        let credentials = issued.into_credentials();

        self.persist(&credentials)
            .await
            .map_err(|e| format!("persisting refreshed credentials: {e}"))?;

        let access = credentials.access.clone();
        *self.access.write().await = Some(access.clone());
        info!("token refresh succeeded");
        Ok(access)
    }

    /// Persist a freshly issued pair under the configured retention.
    async fn persist(&self, credentials: &Credentials) -> session_auth::Result<()> {
        self.store
            .write(
                ACCESS_TOKEN_NAME,
                credentials.access.clone(),
                self.config.write_options.clone(),
            )
            .await?;
        self.store
            .write(
                REFRESH_TOKEN_NAME,
                credentials.refresh.clone(),
                self.config.write_options.clone(),
            )
            .await
    }

    /// Re-issue a previously failed request with the fresh token. A replay
    /// that fails again is surfaced as-is, never re-queued.
    async fn replay(&self, request: ApiRequest, access: &Token) -> Result<ApiResponse> {
        metrics::counter!("replayed_requests_total").increment(1);
        debug!(method = %request.method, path = %request.path, "replaying with refreshed token");
        match self.executor.execute(request.with_bearer(access.expose())).await {
            Ok(response) => Ok(response),
            Err(ExecuteError::Transport(e)) => Err(Error::Transport(e)),
            Err(ExecuteError::Upstream(failure)) => Err(Error::Upstream(failure)),
        }
    }

    /// Surface a failed refresh to one caller. Server-rendering callers get
    /// the typed credential error; interactive callers get their original
    /// rejection back, the sign-out side effect having been applied once by
    /// the leader.
    fn refresh_failed(&self, original: ApiFailure) -> Error {
        match &self.context {
            SessionContext::Interactive(_) => Error::Upstream(original),
            SessionContext::Server => Error::Credential,
        }
    }
}
