//! Presentation request/response correlation.
//!
//! Every outstanding presentation request has an entry in a single pending
//! table keyed by [`RequestId`]. The table lock is held only while an entry
//! is looked up or transitioned, never across an await. Each entry owns a
//! oneshot channel, so any number of callers can wait concurrently without
//! contending with each other or with the delivery task.
//!
//! Entry lifecycle:
//!
//! ```text
//! Pending ──response(accepted|error)──▶ Fulfilled ─┐
//!    │ ────response(rejected)─────────▶ Rejected  ├─ grace period ─▶ removed
//!    │ ────deadline (wait or sweep)───▶ Expired   │
//!    └─────cancel / handle dropped────▶ Cancelled ┘
//! ```
//!
//! A response for an id that is unknown, already settled, or that comes from
//! an identity other than the request's target is an anomaly: it is counted
//! and logged, and never reaches a waiter.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use vc_exchange_core::{CredentialDetail, CredentialResponse, RequestId, ResponseStatus};

use crate::error::{Error, Result};

/// Lifecycle state of a presentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for a response
    Pending,
    /// Answered with presentations or an error status
    Fulfilled,
    /// Explicitly declined by the peer
    Rejected,
    /// The deadline passed without a response
    Expired,
    /// The requester stopped waiting
    Cancelled,
}

impl RequestState {
    /// Whether the request can no longer accept a response
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// Snapshot of an outstanding or recently settled request.
#[derive(Debug, Clone)]
pub struct PresentationRequest {
    /// The correlation identifier
    pub request_id: RequestId,
    /// The identity asked for a presentation
    pub target: String,
    /// What was requested
    pub details: Vec<CredentialDetail>,
    /// When the request was created
    pub created: DateTime<Utc>,
    /// Current lifecycle state
    pub state: RequestState,
}

/// Counters describing the correlator's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Requests still waiting for a response
    pub pending: usize,
    /// Responses whose request id was not known
    pub unknown_responses: u64,
    /// Responses for requests that were already settled
    pub duplicate_responses: u64,
    /// Requests that reached their deadline
    pub expired: u64,
}

struct Entry {
    request: PresentationRequest,
    deadline: Instant,
    waiter_attached: bool,
    sender: Option<oneshot::Sender<CredentialResponse>>,
    settled_at: Option<Instant>,
}

impl Entry {
    fn settle(&mut self, state: RequestState, now: Instant) {
        self.request.state = state;
        self.settled_at = Some(now);
    }
}

/// Matches inbound responses to the requests that caused them.
pub struct Correlator {
    table: Mutex<HashMap<RequestId, Entry>>,
    grace_period: Duration,
    unknown_responses: AtomicU64,
    duplicate_responses: AtomicU64,
    expired: AtomicU64,
}

impl Correlator {
    /// Create a correlator that remembers settled requests for `grace_period`.
    #[must_use]
    pub fn new(grace_period: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            grace_period,
            unknown_responses: AtomicU64::new(0),
            duplicate_responses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Entry>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending request for `target` that expires after `timeout`.
    pub fn register(
        self: &Arc<Self>,
        target: &str,
        details: Vec<CredentialDetail>,
        timeout: Duration,
    ) -> PendingPresentation {
        let (sender, receiver) = oneshot::channel();
        let deadline = Instant::now() + timeout;

        let mut table = self.lock();
        let mut request_id = RequestId::random();
        while table.contains_key(&request_id) {
            request_id = RequestId::random();
        }

        table.insert(
            request_id.clone(),
            Entry {
                request: PresentationRequest {
                    request_id: request_id.clone(),
                    target: target.to_string(),
                    details,
                    created: Utc::now(),
                    state: RequestState::Pending,
                },
                deadline,
                waiter_attached: false,
                sender: Some(sender),
                settled_at: None,
            },
        );
        drop(table);

        debug!(request_id = %request_id, target, ?timeout, "Registered presentation request");
        PendingPresentation {
            request_id,
            deadline,
            receiver,
            outcome: None,
            correlator: Arc::clone(self),
        }
    }

    /// Forget a request that could not be transmitted.
    pub fn remove(&self, request_id: &RequestId) {
        if self.lock().remove(request_id).is_some() {
            debug!(request_id = %request_id, "Removed presentation request");
        }
    }

    /// Snapshot of a request, if it is still tracked.
    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<PresentationRequest> {
        self.lock()
            .get(request_id)
            .map(|entry| entry.request.clone())
    }

    /// Route an inbound response to its waiter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequest`] if no request with this id was sent
    /// to the responding identity, and [`Error::DuplicateResponse`] if the
    /// request is already settled. Both are anomalies for the delivery path
    /// to record, not failures to surface to callers.
    pub fn deliver(&self, response: CredentialResponse) -> Result<()> {
        let request_id = response.request_id().clone();

        let sender = {
            let mut table = self.lock();
            let entry = match table.get_mut(&request_id) {
                Some(entry) if entry.request.target == response.from() => entry,
                _ => {
                    self.unknown_responses.fetch_add(1, Ordering::Relaxed);
                    return Err(Error::UnknownRequest(request_id));
                }
            };
            if entry.request.state.is_terminal() {
                self.duplicate_responses.fetch_add(1, Ordering::Relaxed);
                return Err(Error::DuplicateResponse(request_id));
            }

            let state = match response.status() {
                ResponseStatus::Rejected => RequestState::Rejected,
                ResponseStatus::Accepted | ResponseStatus::Error => RequestState::Fulfilled,
            };
            entry.settle(state, Instant::now());
            entry.sender.take()
        };

        info!(
            request_id = %request_id,
            status = %response.status(),
            presentations = response.presentations().len(),
            "Matched presentation response"
        );
        if let Some(sender) = sender {
            if sender.send(response).is_err() {
                debug!(request_id = %request_id, "Waiter went away before the response arrived");
            }
        }
        Ok(())
    }

    fn attach_waiter(&self, request_id: &RequestId) {
        if let Some(entry) = self.lock().get_mut(request_id) {
            entry.waiter_attached = true;
        }
    }

    /// Move a still-pending request into `state`. Returns false if it had
    /// already settled, in which case its response is in the waiter's channel.
    fn abandon(&self, request_id: &RequestId, state: RequestState) -> bool {
        let mut table = self.lock();
        let Some(entry) = table.get_mut(request_id) else {
            return true;
        };
        if entry.request.state.is_terminal() {
            return false;
        }

        entry.settle(state, Instant::now());
        entry.sender = None;
        if state == RequestState::Expired {
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    fn state(&self, request_id: &RequestId) -> Option<RequestState> {
        self.lock().get(request_id).map(|entry| entry.request.state)
    }

    /// Expire unattended requests past their deadline and drop settled
    /// requests whose grace period has elapsed. Returns the number of
    /// requests expired.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut expired = 0;
        let mut table = self.lock();

        for entry in table.values_mut() {
            if entry.request.state == RequestState::Pending
                && !entry.waiter_attached
                && entry.deadline <= now
            {
                entry.settle(RequestState::Expired, now);
                entry.sender = None;
                expired += 1;
            }
        }

        let grace_period = self.grace_period;
        table.retain(|_, entry| {
            entry
                .settled_at
                .map_or(true, |settled_at| settled_at + grace_period > now)
        });
        drop(table);

        if expired > 0 {
            self.expired.fetch_add(expired as u64, Ordering::Relaxed);
            debug!(expired, "Swept expired presentation requests");
        }
        expired
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CorrelatorStats {
        let pending = self
            .lock()
            .values()
            .filter(|entry| entry.request.state == RequestState::Pending)
            .count();

        CorrelatorStats {
            pending,
            unknown_responses: self.unknown_responses.load(Ordering::Relaxed),
            duplicate_responses: self.duplicate_responses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Run [`Correlator::sweep`] every `interval` until the correlator is dropped.
pub fn spawn_sweeper(correlator: Weak<Correlator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(correlator) = correlator.upgrade() else {
                trace!("Correlator dropped, stopping sweeper");
                break;
            };
            correlator.sweep(Instant::now());
        }
    })
}

#[derive(Debug, Clone)]
enum Outcome {
    Response(CredentialResponse),
    DeadlineExceeded,
    Cancelled,
}

enum Wake {
    Received(std::result::Result<CredentialResponse, oneshot::error::RecvError>),
    Deadline,
    Cancelled,
}

/// Handle to an outstanding presentation request.
///
/// Dropping an unresolved handle cancels the request, so a late response is
/// discarded instead of being matched to a caller that is gone.
pub struct PendingPresentation {
    request_id: RequestId,
    deadline: Instant,
    receiver: oneshot::Receiver<CredentialResponse>,
    outcome: Option<Outcome>,
    correlator: Arc<Correlator>,
}

impl std::fmt::Debug for PendingPresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingPresentation")
            .field("request_id", &self.request_id)
            .field("deadline", &self.deadline)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl PendingPresentation {
    /// The correlation identifier sent to the peer
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// When the request expires
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the response, the request deadline, or `cancel`, whichever
    /// comes first. Once resolved, further calls return the same outcome
    /// without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineExceeded`] when the request timed out and
    /// [`Error::Cancelled`] when `cancel` completed first.
    pub async fn wait_for_response<F>(&mut self, cancel: F) -> Result<CredentialResponse>
    where
        F: Future<Output = ()>,
    {
        if self.outcome.is_none() {
            let outcome = self.resolve(cancel).await;
            self.outcome = Some(outcome);
        }

        match &self.outcome {
            Some(Outcome::Response(response)) => Ok(response.clone()),
            Some(Outcome::DeadlineExceeded) => Err(Error::DeadlineExceeded(self.request_id.clone())),
            Some(Outcome::Cancelled) | None => Err(Error::Cancelled(self.request_id.clone())),
        }
    }

    /// Wait without a caller-side cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineExceeded`] when the request timed out.
    pub async fn wait(&mut self) -> Result<CredentialResponse> {
        self.wait_for_response(std::future::pending()).await
    }

    async fn resolve<F>(&mut self, cancel: F) -> Outcome
    where
        F: Future<Output = ()>,
    {
        self.correlator.attach_waiter(&self.request_id);
        let mut guard = WaitGuard {
            correlator: Arc::clone(&self.correlator),
            request_id: self.request_id.clone(),
            armed: true,
        };

        let wake = tokio::select! {
            biased;
            received = &mut self.receiver => Wake::Received(received),
            () = tokio::time::sleep_until(self.deadline) => Wake::Deadline,
            () = cancel => Wake::Cancelled,
        };
        guard.armed = false;

        match wake {
            Wake::Received(Ok(response)) => Outcome::Response(response),
            Wake::Received(Err(_)) => match self.correlator.state(&self.request_id) {
                Some(RequestState::Cancelled) => Outcome::Cancelled,
                _ => Outcome::DeadlineExceeded,
            },
            Wake::Deadline => self.settle(RequestState::Expired, Outcome::DeadlineExceeded),
            Wake::Cancelled => self.settle(RequestState::Cancelled, Outcome::Cancelled),
        }
    }

    /// Settle locally unless a response won the race, in which case it is
    /// already waiting in the channel.
    fn settle(&mut self, state: RequestState, outcome: Outcome) -> Outcome {
        if self.correlator.abandon(&self.request_id, state) {
            debug!(request_id = %self.request_id, ?state, "Presentation request settled without response");
            return outcome;
        }
        match self.receiver.try_recv() {
            Ok(response) => Outcome::Response(response),
            Err(_) => outcome,
        }
    }
}

/// Cancels the request if a wait is dropped while suspended.
struct WaitGuard {
    correlator: Arc<Correlator>,
    request_id: RequestId,
    armed: bool,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.armed && self.correlator.abandon(&self.request_id, RequestState::Cancelled) {
            debug!(request_id = %self.request_id, "Wait aborted, presentation request cancelled");
        }
    }
}

impl Drop for PendingPresentation {
    fn drop(&mut self) {
        if self.outcome.is_none() && self.correlator.abandon(&self.request_id, RequestState::Cancelled) {
            trace!(request_id = %self.request_id, "Dropped unresolved presentation request");
        }
    }
}

/// Record a delivery anomaly. Anomalies are never surfaced to waiters.
pub(crate) fn record_anomaly(error: &Error) {
    match error {
        Error::UnknownRequest(request_id) => {
            warn!(request_id = %request_id, "Discarding response for unknown request");
        }
        Error::DuplicateResponse(request_id) => {
            warn!(request_id = %request_id, "Discarding response for settled request");
        }
        other => warn!("Discarding response: {other}"),
    }
}
