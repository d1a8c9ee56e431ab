//! Transparent bearer-token refresh for HTTP clients
//!
//! Wraps an HTTP executor with expired-credential recovery: a 401 carrying
//! the `token.expired` sentinel triggers at most one concurrent refresh
//! call, every request that failed on the stale token is replayed once the
//! new token is issued, and unrecoverable failures apply a policy chosen by
//! the session context (interactive sign-out vs. a typed error for
//! server-rendering callers). Every other failure passes through unchanged.
//!
//! Request flow:
//! 1. `Client::request` stamps `Authorization: Bearer <access>` and executes
//! 2. On upstream failure, `classify` picks pass-through / expired / unrecoverable
//! 3. Expired failures enter the single-flight `coordinator`: one caller
//!    becomes the refresh leader, the rest park and replay with the new token
//! 4. Unrecoverable failures apply the `SessionContext` policy

pub mod classify;
pub mod client;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod executor;

pub use classify::{EXPIRED_CODE, FailureClass, classify};
pub use client::{Client, ClientConfig};
pub use context::{SessionContext, SignOut};
pub use coordinator::{Admission, PendingRequest, RefreshCoordinator};
pub use error::{Error, Result};
pub use executor::{ApiFailure, ApiRequest, ApiResponse, ExecuteError, Executor, HttpExecutor};
