//! Per-route-class rate-limit budgets
//!
//! The limiter only keeps state. The transport consults it before every send,
//! records every response into it, and parks 429'd requests on the route's
//! pending queue until a scheduled resubmission picks them up again.

use crate::error::{RestError, Result};
use crate::request::{RateLimitHeaders, RestRequest, RestResponse};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Remaining-request count below which a warning is logged
pub const LOW_REMAINING_THRESHOLD: u32 = 5;

/// A request parked after a 429, with the channel its caller awaits
pub(crate) struct PendingRequest {
    pub request: RestRequest,
    pub responder: oneshot::Sender<Result<RestResponse>>,
}

#[derive(Default)]
struct RateBudget {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    retry_after: Option<f64>,
    retry_until: Option<Instant>,
    bucket: Option<String>,
    pending: VecDeque<PendingRequest>,
}

impl RateBudget {
    fn in_retry_window(&self, now: Instant) -> bool {
        self.retry_until.is_some_and(|until| until > now)
    }
}

#[derive(Default)]
struct LimiterState {
    budgets: HashMap<String, RateBudget>,
    global_until: Option<Instant>,
    scheduled: Vec<AbortHandle>,
}

/// Convert a vendor `retry_after` (seconds) into a window
pub fn retry_window(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Rate-limit bookkeeping shared by every clone of a `RestClient`
#[derive(Default)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a request of this class must wait before it may be sent
    pub fn delay_for(&self, class: &str) -> Option<Duration> {
        let now = Instant::now();
        let state = self.state.lock();

        let global = state.global_until.filter(|until| *until > now);
        let route = state.budgets.get(class).and_then(|budget| {
            if budget.in_retry_window(now) {
                budget.retry_until
            } else if budget.remaining == Some(0) {
                budget.reset_at.filter(|reset| *reset > now)
            } else {
                None
            }
        });

        global
            .into_iter()
            .chain(route)
            .max()
            .map(|until| until.saturating_duration_since(now))
    }

    /// Record a 429 and return the window to wait out
    pub fn record_rate_limited(&self, class: &str, retry_after: f64, global: bool) -> Duration {
        let window = retry_window(retry_after);
        let until = Instant::now() + window;
        let mut state = self.state.lock();

        if global {
            state.global_until = Some(state.global_until.map_or(until, |g| g.max(until)));
            warn!("Global rate limit hit, retry after {:.3}s", retry_after);
        } else {
            let budget = state.budgets.entry(class.to_string()).or_default();
            budget.retry_after = Some(retry_after);
            budget.retry_until = Some(until);
            warn!("Rate limited on {}, retry after {:.3}s", class, retry_after);
        }
        window
    }

    /// Update a class from the headers of a successful response
    ///
    /// Inside a 429 window the reported `remaining` is ignored.
    pub fn record_success(&self, class: &str, headers: &RateLimitHeaders) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let budget = state.budgets.entry(class.to_string()).or_default();

        if headers.bucket.is_some() {
            budget.bucket = headers.bucket.clone();
        }
        if budget.in_retry_window(now) {
            debug!("Ignoring remaining count for {} inside its retry window", class);
            return;
        }
        budget.retry_after = None;
        budget.retry_until = None;

        if let Some(remaining) = headers.remaining {
            budget.remaining = Some(remaining);
            budget.reset_at = headers.reset_after.map(|after| now + after);
            if remaining < LOW_REMAINING_THRESHOLD {
                warn!("Only {} requests remaining on {}", remaining, class);
            }
        }
    }

    /// Last known remaining count, `None` when unknown or inside a 429 window
    pub fn remaining(&self, class: &str) -> Option<u32> {
        let state = self.state.lock();
        let budget = state.budgets.get(class)?;
        if budget.in_retry_window(Instant::now()) {
            return None;
        }
        budget.remaining
    }

    /// The `retry_after` of an active 429 window, in seconds
    pub fn retry_after(&self, class: &str) -> Option<f64> {
        let state = self.state.lock();
        let budget = state.budgets.get(class)?;
        if budget.in_retry_window(Instant::now()) {
            budget.retry_after
        } else {
            None
        }
    }

    pub fn bucket(&self, class: &str) -> Option<String> {
        self.state.lock().budgets.get(class)?.bucket.clone()
    }

    /// Number of requests parked for a class
    pub fn pending(&self, class: &str) -> usize {
        self.state
            .lock()
            .budgets
            .get(class)
            .map_or(0, |budget| budget.pending.len())
    }

    pub fn pending_total(&self) -> usize {
        self.state
            .lock()
            .budgets
            .values()
            .map(|budget| budget.pending.len())
            .sum()
    }

    pub(crate) fn defer(&self, class: &str, pending: PendingRequest) {
        let mut state = self.state.lock();
        let budget = state.budgets.entry(class.to_string()).or_default();
        budget.pending.push_back(pending);
        debug!("Deferred request on {} ({} pending)", class, budget.pending.len());
    }

    pub(crate) fn take_next(&self, class: &str) -> Option<PendingRequest> {
        self.state.lock().budgets.get_mut(class)?.pending.pop_front()
    }

    /// Put a request that was rate-limited again back at the head of its queue
    pub(crate) fn requeue_front(&self, class: &str, pending: PendingRequest) {
        let mut state = self.state.lock();
        let budget = state.budgets.entry(class.to_string()).or_default();
        budget.pending.push_front(pending);
    }

    pub(crate) fn track(&self, handle: AbortHandle) {
        let mut state = self.state.lock();
        state.scheduled.retain(|h| !h.is_finished());
        state.scheduled.push(handle);
    }

    /// Abort every scheduled resubmission and fail the parked requests
    ///
    /// Returns how many callers were cancelled.
    pub fn cancel_pending(&self) -> usize {
        let (handles, parked) = {
            let mut state = self.state.lock();
            let handles = std::mem::take(&mut state.scheduled);
            let parked: Vec<PendingRequest> = state
                .budgets
                .values_mut()
                .flat_map(|budget| budget.pending.drain(..))
                .collect();
            (handles, parked)
        };

        for handle in handles {
            handle.abort();
        }

        let cancelled = parked.len();
        for pending in parked {
            let _ = pending.responder.send(Err(RestError::Cancelled));
        }
        if cancelled > 0 {
            warn!("Cancelled {} pending requests", cancelled);
        }
        cancelled
    }
}
