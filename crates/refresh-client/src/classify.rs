//! Failure classification for upstream responses
//!
//! Distinguishes the one recoverable failure (a 401 carrying the expiry
//! sentinel) from ordinary failures and from 401s that mean the session
//! credential is invalid rather than merely stale. Pure classification,
//! no side effects.

use crate::executor::ApiFailure;

/// Body code the backend sets on a 401 caused by access-token expiry.
pub const EXPIRED_CODE: &str = "token.expired";

/// What to do with a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Propagate the original failure unchanged.
    PassThrough,
    /// Eligible for refresh-and-replay.
    ExpiredRetry,
    /// Credential invalid, not merely expired; no refresh attempted.
    Unrecoverable,
}

/// Classify a failed response by status and body code.
pub fn classify(failure: &ApiFailure) -> FailureClass {
    if failure.status != 401 {
        return FailureClass::PassThrough;
    }
    if failure.code() == Some(EXPIRED_CODE) {
        FailureClass::ExpiredRetry
    } else {
        FailureClass::Unrecoverable
    }
}
