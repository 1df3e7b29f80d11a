//! Per-request state shared by the pipeline stages.
//!
//! The request ID is assigned by the request ID stage; the transpile stage
//! records how the gate settled the response.

use crate::gate::Outcome;
use kindle_core::RequestId;
use std::time::{Duration, Instant};

/// State carried alongside one request.
///
/// # Example
///
/// ```
/// use kindle_middleware::context::MiddlewareContext;
/// use kindle_middleware::Outcome;
///
/// let mut ctx = MiddlewareContext::new();
/// assert_eq!(ctx.outcome(), None);
/// ctx.record_outcome(Outcome::Degraded);
/// assert_eq!(ctx.outcome(), Some(Outcome::Degraded));
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    request_id: RequestId,
    received: Instant,
    outcome: Option<Outcome>,
}

impl MiddlewareContext {
    /// Starts the clock for a request with a provisional ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Starts the clock for a request with a known ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            received: Instant::now(),
            outcome: None,
        }
    }

    /// ID used in logs and the `X-Request-ID` response header.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the provisional ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.received.elapsed()
    }

    /// Records how the gate settled the response. A later call wins.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    /// The gate outcome, if a transpile stage settled the response.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_can_be_replaced() {
        let provisional = RequestId::new();
        let mut ctx = MiddlewareContext::with_request_id(provisional);
        assert_eq!(ctx.request_id(), provisional);

        let assigned = RequestId::new();
        ctx.set_request_id(assigned);
        assert_eq!(ctx.request_id(), assigned);
    }

    #[test]
    fn test_last_outcome_wins() {
        let mut ctx = MiddlewareContext::new();
        ctx.record_outcome(Outcome::Degraded);
        ctx.record_outcome(Outcome::Transpiled);
        assert_eq!(ctx.outcome(), Some(Outcome::Transpiled));
    }

    #[test]
    fn test_elapsed_grows() {
        let ctx = MiddlewareContext::new();
        std::thread::sleep(Duration::from_millis(5));
        assert!(ctx.elapsed() >= Duration::from_millis(5));
    }
}
