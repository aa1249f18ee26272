//! Gateway request/response types and the per-request state machine.
//!
//! A [`GatewayRequest`] is built by the caller and passed to the router by
//! reference; the router never mutates it. A [`GatewayResponse`] always
//! satisfies `execution_id.is_some() == !failed`, which the constructors
//! enforce by keeping the fields private.

use crate::error::{CoreError, Result};
use crate::order::OrderIntent;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Caller-supplied correlation token, unique per logical intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidRequest("request id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Venue ticket confirming execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Actions and payloads
// ============================================================================

/// Whether an action may be repeated without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Read-style or heartbeat; safe to retry on any transport failure.
    Query,
    /// Has financial consequences; only provably pre-execution failures are retried.
    Write,
}

/// Trading command understood by the venue gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Heartbeat,
    AccountInfo,
    Positions,
    SymbolInfo,
    OrderSend,
    ClosePosition,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Heartbeat | Self::AccountInfo | Self::Positions | Self::SymbolInfo => {
                ActionKind::Query
            }
            Self::OrderSend | Self::ClosePosition => ActionKind::Write,
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind() == ActionKind::Write
    }

    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::AccountInfo => "account_info",
            Self::Positions => "positions",
            Self::SymbolInfo => "symbol_info",
            Self::OrderSend => "order_send",
            Self::ClosePosition => "close_position",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action-specific request data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Empty,
    Symbol { symbol: String },
    Order(OrderIntent),
    Close { ticket: u64, symbol: String },
}

/// Structured trading command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    request_id: RequestId,
    action: Action,
    payload: Payload,
}

impl GatewayRequest {
    /// Build a request, checking that the payload shape fits the action.
    pub fn new(request_id: RequestId, action: Action, payload: Payload) -> Result<Self> {
        let fits = matches!(
            (action, &payload),
            (Action::Heartbeat | Action::AccountInfo | Action::Positions, Payload::Empty)
                | (Action::SymbolInfo, Payload::Symbol { .. })
                | (Action::OrderSend, Payload::Order(_))
                | (Action::ClosePosition, Payload::Close { .. })
        );
        if !fits {
            return Err(CoreError::InvalidRequest(format!(
                "{request_id}: payload does not match action {action}"
            )));
        }
        Ok(Self {
            request_id,
            action,
            payload,
        })
    }

    pub fn heartbeat(request_id: RequestId) -> Self {
        Self {
            request_id,
            action: Action::Heartbeat,
            payload: Payload::Empty,
        }
    }

    pub fn account_info(request_id: RequestId) -> Self {
        Self {
            request_id,
            action: Action::AccountInfo,
            payload: Payload::Empty,
        }
    }

    pub fn positions(request_id: RequestId) -> Self {
        Self {
            request_id,
            action: Action::Positions,
            payload: Payload::Empty,
        }
    }

    pub fn symbol_info(request_id: RequestId, symbol: impl Into<String>) -> Self {
        Self {
            request_id,
            action: Action::SymbolInfo,
            payload: Payload::Symbol {
                symbol: symbol.into(),
            },
        }
    }

    pub fn order_send(request_id: RequestId, intent: OrderIntent) -> Self {
        Self {
            request_id,
            action: Action::OrderSend,
            payload: Payload::Order(intent),
        }
    }

    pub fn close_position(request_id: RequestId, ticket: u64, symbol: impl Into<String>) -> Self {
        Self {
            request_id,
            action: Action::ClosePosition,
            payload: Payload::Close {
                ticket,
                symbol: symbol.into(),
            },
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

// ============================================================================
// Request state machine
// ============================================================================

/// Lifecycle of one gateway request.
///
/// `Received -> {RejectedByRisk | Dispatched}`,
/// `Dispatched -> {Executed | VenueRejected | TimeoutUnknown | ConnectionFailed}`,
/// then `Responded` once the result is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Received,
    RejectedByRisk,
    Dispatched,
    /// Venue confirmed the request and returned a ticket.
    Executed,
    /// Venue answered authoritatively with an error code.
    VenueRejected,
    /// Write timed out; the venue may or may not have executed it.
    TimeoutUnknown,
    ConnectionFailed,
    Responded,
}

impl RequestState {
    /// Terminal outcome states (before the final `Responded` hand-off).
    pub fn is_outcome(&self) -> bool {
        matches!(
            self,
            Self::RejectedByRisk
                | Self::Executed
                | Self::VenueRejected
                | Self::TimeoutUnknown
                | Self::ConnectionFailed
        )
    }

    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, RejectedByRisk)
                | (Received, Dispatched)
                | (Dispatched, Executed)
                | (Dispatched, VenueRejected)
                | (Dispatched, TimeoutUnknown)
                | (Dispatched, ConnectionFailed)
                | (RejectedByRisk, Responded)
                | (Executed, Responded)
                | (VenueRejected, Responded)
                | (TimeoutUnknown, Responded)
                | (ConnectionFailed, Responded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::RejectedByRisk => "rejected_by_risk",
            Self::Dispatched => "dispatched",
            Self::Executed => "executed",
            Self::VenueRejected => "venue_rejected",
            Self::TimeoutUnknown => "timeout_unknown",
            Self::ConnectionFailed => "connection_failed",
            Self::Responded => "responded",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Response
// ============================================================================

/// Venue status code or a local sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// Code reported by the venue.
    Venue(i32),
    /// The request may or may not have executed.
    Unknown,
    /// Blocked by the risk gate; never sent.
    RiskRejected,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Venue(code) => write!(f, "{code}"),
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::RiskRejected => f.write_str("RISK_REJECTED"),
        }
    }
}

/// Message attached to write timeouts.
pub const OUTCOME_UNKNOWN_MESSAGE: &str = "timeout — outcome unknown, not retrying";

/// Classified result of a routed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    failed: bool,
    result_code: ResultCode,
    message: String,
    execution_id: Option<ExecutionId>,
    data: Option<serde_json::Value>,
    state: RequestState,
}

impl GatewayResponse {
    /// Confirmed success carrying the venue ticket.
    pub fn executed(
        retcode: i32,
        message: impl Into<String>,
        execution_id: ExecutionId,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            failed: false,
            result_code: ResultCode::Venue(retcode),
            message: message.into(),
            execution_id: Some(execution_id),
            data,
            state: RequestState::Executed,
        }
    }

    /// Authoritative venue error.
    pub fn venue_rejected(retcode: i32, message: impl Into<String>) -> Self {
        Self {
            failed: true,
            result_code: ResultCode::Venue(retcode),
            message: message.into(),
            execution_id: None,
            data: None,
            state: RequestState::VenueRejected,
        }
    }

    /// Write whose outcome could not be determined.
    pub fn outcome_unknown() -> Self {
        Self {
            failed: true,
            result_code: ResultCode::Unknown,
            message: OUTCOME_UNKNOWN_MESSAGE.to_string(),
            execution_id: None,
            data: None,
            state: RequestState::TimeoutUnknown,
        }
    }

    /// Blocked before dispatch; the reason is passed through verbatim.
    pub fn rejected_by_risk(reason: impl Into<String>) -> Self {
        Self {
            failed: true,
            result_code: ResultCode::RiskRejected,
            message: reason.into(),
            execution_id: None,
            data: None,
            state: RequestState::RejectedByRisk,
        }
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn result_code(&self) -> ResultCode {
        self.result_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.execution_id
    }

    /// Query result body, if the venue sent one.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Outcome state reached before the response was handed back.
    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_outcome_unknown(&self) -> bool {
        self.result_code == ResultCode::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Direction;
    use crate::Lots;
    use rust_decimal_macros::dec;

    fn rid(s: &str) -> RequestId {
        RequestId::new(s).unwrap()
    }

    #[test]
    fn test_action_kinds() {
        assert_eq!(Action::Heartbeat.kind(), ActionKind::Query);
        assert_eq!(Action::SymbolInfo.kind(), ActionKind::Query);
        assert_eq!(Action::OrderSend.kind(), ActionKind::Write);
        assert!(Action::ClosePosition.is_write());
    }

    #[test]
    fn test_action_wire_name_matches_serde() {
        for action in [
            Action::Heartbeat,
            Action::AccountInfo,
            Action::Positions,
            Action::SymbolInfo,
            Action::OrderSend,
            Action::ClosePosition,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn test_empty_request_id_rejected() {
        assert!(RequestId::new("  ").is_err());
    }

    #[test]
    fn test_payload_must_match_action() {
        let intent = OrderIntent::new("EURUSD", Direction::Buy, Lots::new(dec!(0.1)));
        assert!(GatewayRequest::new(rid("a"), Action::Heartbeat, Payload::Order(intent.clone()))
            .is_err());
        assert!(GatewayRequest::new(rid("b"), Action::OrderSend, Payload::Order(intent)).is_ok());
        assert!(GatewayRequest::new(rid("c"), Action::SymbolInfo, Payload::Empty).is_err());
    }

    #[test]
    fn test_execution_id_iff_success() {
        let ok = GatewayResponse::executed(10009, "done", ExecutionId(42), None);
        assert!(!ok.failed());
        assert_eq!(ok.execution_id(), Some(ExecutionId(42)));

        for failed in [
            GatewayResponse::venue_rejected(10019, "no money"),
            GatewayResponse::outcome_unknown(),
            GatewayResponse::rejected_by_risk("halted"),
        ] {
            assert!(failed.failed());
            assert!(failed.execution_id().is_none());
        }
    }

    #[test]
    fn test_outcome_unknown_shape() {
        let resp = GatewayResponse::outcome_unknown();
        assert_eq!(resp.result_code(), ResultCode::Unknown);
        assert_eq!(resp.message(), OUTCOME_UNKNOWN_MESSAGE);
        assert_eq!(resp.state(), RequestState::TimeoutUnknown);
    }

    #[test]
    fn test_state_transitions() {
        use RequestState::*;
        assert!(Received.can_transition_to(Dispatched));
        assert!(Received.can_transition_to(RejectedByRisk));
        assert!(Dispatched.can_transition_to(TimeoutUnknown));
        assert!(TimeoutUnknown.can_transition_to(Responded));
        assert!(!Received.can_transition_to(Executed));
        assert!(!RejectedByRisk.can_transition_to(Dispatched));
        assert!(!Executed.can_transition_to(Dispatched));
        assert!(!Dispatched.is_outcome());
        assert!(ConnectionFailed.is_outcome());
    }
}
