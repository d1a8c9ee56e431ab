//! Request execution abstraction
//!
//! Defines the `Executor` trait that decouples the facade and refresh
//! coordination from the transport. `HttpExecutor` is the reqwest-backed
//! implementation; tests substitute recording doubles.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// One outgoing request. Cloneable so a request that failed on a stale
/// token can be replayed with a fresh Authorization header.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the executor's base URL, with a leading slash.
    pub path: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the Authorization header with a bearer token.
    pub fn with_bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "token not stampable as a header value, skipping"),
        }
        self
    }
}

/// A successful upstream response with its body parsed as JSON where
/// possible (`Null` for empty bodies, a plain string otherwise).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed value.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone())
    }
}

/// A structured upstream failure: non-2xx status plus the parsed body.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: u16,
    pub body: Value,
}

impl ApiFailure {
    /// The backend's machine-readable failure code, if the body carries one.
    pub fn code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

/// Errors from executing one request.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Upstream produced a non-success status.
    #[error("upstream returned {}", .0.status)]
    Upstream(ApiFailure),

    /// The request never produced an upstream status.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Issues one HTTP request.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn Executor>`).
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, ExecuteError>> + Send + '_>>;
}

/// reqwest-backed executor bound to a base URL.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    /// Build an executor with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExecuteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecuteError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn run(&self, request: ApiRequest) -> Result<ApiResponse, ExecuteError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExecuteError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| ExecuteError::Transport(format!("reading response body: {e}")))?;

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text))
        };

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            debug!(%url, status = status.as_u16(), "upstream failure");
            Err(ExecuteError::Upstream(ApiFailure {
                status: status.as_u16(),
                body,
            }))
        }
    }
}

impl Executor for HttpExecutor {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, ExecuteError>> + Send + '_>> {
        Box::pin(self.run(request))
    }
}
