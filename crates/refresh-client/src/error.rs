//! Error types surfaced by the client facade

use crate::executor::ApiFailure;

/// Errors from client requests.
///
/// `Upstream` carries the original failure unchanged (the pass-through
/// policy, and the interactive surface after a failed refresh). `Credential`
/// is the typed form surfaced to server-rendering callers when credentials
/// cannot be refreshed; it carries no payload beyond the fact itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Original upstream failure, surfaced unchanged.
    #[error("upstream returned {}", .0.status)]
    Upstream(ApiFailure),

    /// The transport failed before an upstream status was produced.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Credentials could not be refreshed (server-rendering surface).
    #[error("credentials could not be refreshed")]
    Credential,

    /// A queued request outlived the bounded wait for the in-flight refresh.
    #[error("timed out waiting for in-flight token refresh")]
    RefreshTimeout,

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Store(#[from] session_auth::Error),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
