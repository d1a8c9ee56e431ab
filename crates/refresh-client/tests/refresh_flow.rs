//! Refresh coordination behavior against an in-process backend double.
//!
//! The double accepts only one bearer value: requests stamped with anything
//! else fail with the expiry sentinel, so a client seeded with a stale
//! token exercises the full expired -> refresh -> replay path.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde_json::json;

use refresh_client::{
    ApiFailure, ApiRequest, ApiResponse, Client, ClientConfig, Error, ExecuteError, Executor,
    SessionContext, SignOut,
};
use session_auth::{CredentialStore, Credentials, MemoryStore};

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    bearer: Option<String>,
}

/// Backend double. `/refresh` counts calls, waits `refresh_delay` (so
/// concurrent failures can pile up behind the in-flight refresh), then
/// either issues the configured pair or fails with `refresh_status`.
struct FakeBackend {
    valid: String,
    issued: (String, String),
    refresh_delay: Duration,
    refresh_status: Mutex<Option<u16>>,
    deny_code: Option<&'static str>,
    refresh_calls: AtomicUsize,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeBackend {
    fn new(valid: &str, issued: (&str, &str)) -> Self {
        Self {
            valid: valid.to_string(),
            issued: (issued.0.to_string(), issued.1.to_string()),
            refresh_delay: Duration::from_millis(50),
            refresh_status: Mutex::new(None),
            deny_code: None,
            refresh_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn set_refresh_status(&self, status: Option<u16>) {
        *self.refresh_status.lock().unwrap() = status;
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn requests_with(&self, bearer: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bearer.as_deref() == Some(bearer))
            .cloned()
            .collect()
    }
}

impl Executor for FakeBackend {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, ExecuteError>> + Send + '_>> {
        Box::pin(async move {
            if request.path == "/refresh" {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.refresh_delay).await;
                let status = *self.refresh_status.lock().unwrap();
                if let Some(status) = status {
                    return Err(ExecuteError::Upstream(ApiFailure {
                        status,
                        body: json!({"code": "session.revoked"}),
                    }));
                }
                return Ok(ApiResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: json!({
                        "token": self.issued.0,
                        "refreshToken": self.issued.1,
                    }),
                });
            }

            let bearer = request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.requests.lock().unwrap().push(Recorded {
                path: request.path.clone(),
                bearer: bearer.clone(),
            });

            if request.path == "/boom" {
                return Err(ExecuteError::Upstream(ApiFailure {
                    status: 500,
                    body: json!({"message": "boom"}),
                }));
            }
            if let Some(code) = self.deny_code {
                return Err(ExecuteError::Upstream(ApiFailure {
                    status: 401,
                    body: json!({"code": code}),
                }));
            }

            let expected = format!("Bearer {}", self.valid);
            if bearer.as_deref() == Some(expected.as_str()) {
                Ok(ApiResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: json!({"ok": true}),
                })
            } else {
                Err(ExecuteError::Upstream(ApiFailure {
                    status: 401,
                    body: json!({"code": "token.expired"}),
                }))
            }
        })
    }
}

#[derive(Default)]
struct RecordingSignOut(AtomicUsize);

impl RecordingSignOut {
    fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl SignOut for RecordingSignOut {
    fn sign_out(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

async fn build_client(
    backend: Arc<FakeBackend>,
    context: SessionContext,
) -> (Client, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_credentials(Credentials::new("T1", "R1")));
    let client = Client::with_executor(
        backend,
        ClientConfig::new("http://test"),
        context,
        store.clone(),
    )
    .await
    .expect("client");
    (client, store)
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    let (client, store) = build_client(backend.clone(), SessionContext::Server).await;

    let (a, b, c) = tokio::join!(client.get("/a"), client.get("/b"), client.get("/c"));
    assert!(a.is_ok(), "a: {a:?}");
    assert!(b.is_ok(), "b: {b:?}");
    assert!(c.is_ok(), "c: {c:?}");

    // Single-flight: one refresh call for three concurrent expirations
    assert_eq!(backend.refresh_calls(), 1);

    // Full drain: each request replayed once with the issued token
    let replays = backend.requests_with("Bearer T2");
    let mut paths: Vec<_> = replays.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, ["/a", "/b", "/c"]);

    // Both halves of the pair were rotated in the store
    let stored = store.read("/").await.unwrap();
    assert_eq!(stored.access_token.unwrap().expose(), "T2");
    assert_eq!(stored.refresh_token.unwrap().expose(), "R2");
}

#[tokio::test]
async fn new_requests_after_refresh_carry_the_fresh_token() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    let (client, _store) = build_client(backend.clone(), SessionContext::Server).await;

    client.get("/a").await.expect("recovered");
    client.get("/b").await.expect("fresh token");

    // /b never failed: it was stamped with T2 from the start
    let with_fresh = backend.requests_with("Bearer T2");
    assert!(with_fresh.iter().any(|r| r.path == "/b"));
    let with_stale = backend.requests_with("Bearer T1");
    assert!(!with_stale.iter().any(|r| r.path == "/b"));
}

#[tokio::test]
async fn failed_refresh_rejects_every_caller_then_allows_a_new_cycle() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    backend.set_refresh_status(Some(401));
    let (client, _store) = build_client(backend.clone(), SessionContext::Server).await;

    let (a, b, c) = tokio::join!(client.get("/a"), client.get("/b"), client.get("/c"));
    for result in [a, b, c] {
        assert!(matches!(result, Err(Error::Credential)), "got {result:?}");
    }
    assert_eq!(backend.refresh_calls(), 1);

    // The failed cycle must not block a later one
    backend.set_refresh_status(None);
    client.get("/d").await.expect("new cycle succeeds");
    assert_eq!(backend.refresh_calls(), 2);
}

#[tokio::test]
async fn failed_refresh_signs_out_exactly_once_in_interactive_context() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    backend.set_refresh_status(Some(401));
    let sign_out = Arc::new(RecordingSignOut::default());
    let (client, _store) = build_client(
        backend.clone(),
        SessionContext::Interactive(sign_out.clone()),
    )
    .await;

    let (a, b, c) = tokio::join!(client.get("/a"), client.get("/b"), client.get("/c"));
    for result in [a, b, c] {
        match result {
            Err(Error::Upstream(failure)) => {
                // Interactive callers get their original rejection back
                assert_eq!(failure.status, 401);
                assert_eq!(failure.code(), Some("token.expired"));
            }
            other => panic!("expected original rejection, got {other:?}"),
        }
    }
    assert_eq!(sign_out.calls(), 1);
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn facades_never_share_refresh_state() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    let (client_a, _) = build_client(backend.clone(), SessionContext::Server).await;
    let (client_b, _) = build_client(backend.clone(), SessionContext::Server).await;

    // Both expire while the other's refresh is in flight; with per-facade
    // state each one runs its own refresh
    let (a, b) = tokio::join!(client_a.get("/a"), client_b.get("/b"));
    assert!(a.is_ok(), "a: {a:?}");
    assert!(b.is_ok(), "b: {b:?}");
    assert_eq!(backend.refresh_calls(), 2);
}

#[tokio::test]
async fn invalid_session_signs_out_without_refreshing() {
    let mut backend = FakeBackend::new("T2", ("T2", "R2"));
    backend.deny_code = Some("invalid_session");
    let backend = Arc::new(backend);
    let sign_out = Arc::new(RecordingSignOut::default());
    let (client, _store) = build_client(
        backend.clone(),
        SessionContext::Interactive(sign_out.clone()),
    )
    .await;

    let err = client.get("/me").await.expect_err("must fail");
    match err {
        Error::Upstream(failure) => assert_eq!(failure.status, 401),
        other => panic!("expected original rejection, got {other:?}"),
    }
    assert_eq!(sign_out.calls(), 1);
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn invalid_session_is_a_typed_error_for_server_callers() {
    let mut backend = FakeBackend::new("T2", ("T2", "R2"));
    backend.deny_code = Some("invalid_session");
    let backend = Arc::new(backend);
    let (client, _store) = build_client(backend.clone(), SessionContext::Server).await;

    let err = client.get("/me").await.expect_err("must fail");
    assert!(matches!(err, Error::Credential), "got {err:?}");
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn non_401_failures_pass_through_unchanged() {
    let backend = Arc::new(FakeBackend::new("T2", ("T2", "R2")));
    let (client, _store) = build_client(backend.clone(), SessionContext::Server).await;

    let err = client.get("/boom").await.expect_err("must fail");
    match err {
        Error::Upstream(failure) => {
            assert_eq!(failure.status, 500);
            assert_eq!(failure.body["message"], "boom");
        }
        other => panic!("expected pass-through, got {other:?}"),
    }
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn parked_request_times_out_when_refresh_never_resolves() {
    let mut backend = FakeBackend::new("T2", ("T2", "R2"));
    backend.refresh_delay = Duration::from_secs(3600);
    let backend = Arc::new(backend);

    let store = Arc::new(MemoryStore::with_credentials(Credentials::new("T1", "R1")));
    let client = Client::with_executor(
        backend.clone(),
        ClientConfig::new("http://test").queue_wait(Duration::from_secs(1)),
        SessionContext::Server,
        store,
    )
    .await
    .expect("client");

    // The first future becomes the leader and hangs in the refresh call;
    // the second parks and must give up after the bounded wait
    let (leader, waiter) = tokio::join!(client.get("/a"), client.get("/b"));
    assert!(leader.is_ok(), "leader: {leader:?}");
    assert!(matches!(waiter, Err(Error::RefreshTimeout)), "got {waiter:?}");
    assert_eq!(backend.refresh_calls(), 1);
}
