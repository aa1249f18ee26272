//! Per-request state tracking.

use bridge_core::{Action, RequestId, RequestState};
use bridge_telemetry::Metrics;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Records the state transitions of one routed request.
#[derive(Debug)]
pub struct RequestLifecycle {
    request_id: RequestId,
    action: Action,
    state: RequestState,
    started: Instant,
    history: Vec<RequestState>,
}

impl RequestLifecycle {
    pub fn new(request_id: RequestId, action: Action) -> Self {
        Self {
            request_id,
            action,
            state: RequestState::Received,
            started: Instant::now(),
            history: vec![RequestState::Received],
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// States visited so far, oldest first.
    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`. Illegal edges are logged and ignored.
    pub fn advance(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                req_id = %self.request_id,
                action = %self.action,
                from = %self.state,
                to = %next,
                "Illegal request state transition ignored"
            );
            return false;
        }
        debug!(
            req_id = %self.request_id,
            action = %self.action,
            from = %self.state,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Request state"
        );
        if next.is_outcome() {
            Metrics::gateway_outcome(self.action.as_str(), next.as_str());
        }
        self.state = next;
        self.history.push(next);
        true
    }

    /// Record the outcome state and hand the request back.
    pub fn finish(&mut self, outcome: RequestState) {
        if self.advance(outcome) {
            self.advance(RequestState::Responded);
        }
    }
}
