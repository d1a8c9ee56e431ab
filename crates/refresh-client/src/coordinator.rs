//! Single-flight refresh coordination
//!
//! Serializes concurrent refresh attempts: the first expired failure becomes
//! the leader and issues the one refresh call; every expired failure arriving
//! while that call is in flight is parked as an explicit continuation record.
//! Settling takes the whole queue and clears the in-flight flag under the
//! same lock acquisition, so `in_flight == false` is never observed with a
//! non-empty queue, and an expired failure arriving after a drain starts a
//! brand-new refresh cycle.

use std::collections::VecDeque;

use reqwest::Method;
use session_auth::Token;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

/// Outcome delivered to a parked request when the in-flight refresh
/// settles: the freshly issued access token, or the refresh failure reason.
pub type RefreshOutcome = std::result::Result<Token, String>;

/// One parked request.
///
/// The continuation half lives in the queue; the caller awaits the
/// receiving half and re-issues its own retained request on resolution.
/// Method and path are kept for logging and inspection.
#[derive(Debug)]
pub struct PendingRequest {
    method: String,
    path: String,
    tx: oneshot::Sender<RefreshOutcome>,
}

impl PendingRequest {
    /// Resolve with the freshly issued access token.
    fn resolve(self, token: Token) {
        if self.tx.send(Ok(token)).is_err() {
            debug!(method = %self.method, path = %self.path, "queued caller gone before replay");
        }
    }

    /// Reject with the refresh failure reason.
    fn fail(self, reason: String) {
        if self.tx.send(Err(reason)).is_err() {
            debug!(method = %self.method, path = %self.path, "queued caller gone before rejection");
        }
    }
}

/// `in_flight` is true iff a refresh call has been issued and not yet
/// resolved. While it is true no second refresh call is issued; expired
/// failures are appended to `queue` instead.
#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    queue: VecDeque<PendingRequest>,
}

/// How an expired failure enters the refresh cycle.
#[derive(Debug)]
pub enum Admission {
    /// This caller issues the refresh call.
    Leader,
    /// A refresh is already in flight; await the settled outcome.
    Queued(oneshot::Receiver<RefreshOutcome>),
}

/// Per-facade single-flight state.
///
/// Owned exclusively by one client facade and never shared: two facades
/// (two unrelated server-side requests) must not observe each other's
/// queue or in-flight flag.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one expired failure.
    ///
    /// The check-and-set of the in-flight flag and the enqueue happen under
    /// a single lock acquisition, so any number of concurrent admissions
    /// while idle yield exactly one leader.
    pub async fn admit(&self, method: &Method, path: &str) -> Admission {
        let mut state = self.state.lock().await;
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(PendingRequest {
                method: method.to_string(),
                path: path.to_string(),
                tx,
            });
            debug!(%method, path, queued = state.queue.len(), "refresh in flight, parking request");
            Admission::Queued(rx)
        } else {
            state.in_flight = true;
            debug!(%method, path, "no refresh in flight, caller becomes leader");
            Admission::Leader
        }
    }

    /// Settle a successful refresh: drain the queue FIFO, handing each
    /// parked request the new access token.
    pub async fn settle_success(&self, token: &Token) {
        let pending = self.take_queue().await;
        debug!(drained = pending.len(), "refresh succeeded, releasing parked requests");
        for entry in pending {
            entry.resolve(token.clone());
        }
    }

    /// Settle a failed refresh: drain the queue FIFO, rejecting every
    /// parked request with the reason.
    pub async fn settle_failure(&self, reason: &str) {
        let pending = self.take_queue().await;
        debug!(drained = pending.len(), reason, "refresh failed, rejecting parked requests");
        for entry in pending {
            entry.fail(reason.to_string());
        }
    }

    /// Number of parked requests (diagnostics and tests).
    pub async fn queued(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Whether a refresh call is currently in flight.
    pub async fn in_flight(&self) -> bool {
        self.state.lock().await.in_flight
    }

    async fn take_queue(&self) -> VecDeque<PendingRequest> {
        let mut state = self.state.lock().await;
        state.in_flight = false;
        std::mem::take(&mut state.queue)
    }
}
