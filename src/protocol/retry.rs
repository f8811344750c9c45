//! Timeout and retry bookkeeping for the single in-flight request.

use std::time::Duration;

/// The two request kinds a state can have outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `RequestConfig`, awaiting a `ResponseConfig`.
    Config,
    /// `RequestMeasured`, awaiting a `ResponseMeasured`.
    Measured,
}

/// Bookkeeping for at most one outstanding request.
///
/// Owned exclusively by the active protocol state. `last_request` of `None`
/// doubles as the idle marker between periodic requests; the elapsed timer
/// keeps running while idle so the same counter also paces the measurement
/// interval.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    last_request: Option<RequestKind>,
    elapsed: Duration,
    retries: u32,
}

impl RetryState {
    /// Fresh, idle bookkeeping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate scheduler time.
    pub fn advance(&mut self, delta: Duration) {
        self.elapsed += delta;
    }

    /// Record a newly sent request; resets the timer and the retry count.
    pub fn begin(&mut self, kind: RequestKind) {
        self.last_request = Some(kind);
        self.elapsed = Duration::ZERO;
        self.retries = 0;
    }

    /// Record a timeout boundary: bump the retry count, reset the timer.
    ///
    /// Returns the new retry count for comparison against the budget.
    pub fn on_timeout(&mut self) -> u32 {
        self.retries += 1;
        self.elapsed = Duration::ZERO;
        self.retries
    }

    /// Record the matching response; back to idle with fresh counters.
    pub fn acknowledge(&mut self) {
        self.last_request = None;
        self.elapsed = Duration::ZERO;
        self.retries = 0;
    }

    /// Whether no request is outstanding.
    pub fn is_idle(&self) -> bool {
        self.last_request.is_none()
    }

    /// The outstanding request, if any.
    pub fn last_request(&self) -> Option<RequestKind> {
        self.last_request
    }

    /// Time accumulated since the last send, response, or timeout boundary.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Retries spent on the outstanding request.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
