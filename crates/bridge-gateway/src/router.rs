//! Gateway protocol router.
//!
//! Decides per command whether a failed exchange may be repeated:
//! - queries run on the socket channel and retry any connection-class failure
//! - writes run on the direct channel and retry only failures that provably
//!   happened before the venue saw the request
//!
//! A write that might have executed is never repeated. It comes back as a
//! failed response with [`ResultCode::Unknown`](bridge_core::ResultCode) so
//! the caller can reconcile positions before deciding to resubmit.

use std::sync::Arc;

use bridge_core::{
    Action, ActionKind, Direction, EquitySnapshot, ExecutionId, GatewayRequest, GatewayResponse,
    Lots, OrderIntent, Payload, RequestId, RequestState, ResultCode,
};
use bridge_resilience::{InvokeError, Invoker, RetryPolicy};
use bridge_risk::{RiskGate, RiskSession, SpecCache};
use bridge_telemetry::Metrics;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::lifecycle::RequestLifecycle;
use crate::transport::{DynTransport, TransportError};
use crate::wire::{WireRequest, WireResponse};

/// Retry policy per action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterPolicies {
    pub query: RetryPolicy,
    pub write: RetryPolicy,
}

impl Default for RouterPolicies {
    fn default() -> Self {
        Self {
            query: RetryPolicy::socket_channel(),
            write: RetryPolicy::order_submission(),
        }
    }
}

/// Routes structured commands to the venue.
pub struct GatewayRouter {
    invoker: Invoker,
    query_transport: DynTransport,
    write_transport: DynTransport,
    policies: RouterPolicies,
    risk_gate: RiskGate,
    session: Arc<RiskSession>,
    specs: Arc<SpecCache>,
}

impl GatewayRouter {
    pub fn new(
        invoker: Invoker,
        query_transport: DynTransport,
        write_transport: DynTransport,
        risk_gate: RiskGate,
        session: Arc<RiskSession>,
        specs: Arc<SpecCache>,
    ) -> Self {
        Self {
            invoker,
            query_transport,
            write_transport,
            policies: RouterPolicies::default(),
            risk_gate,
            session,
            specs,
        }
    }

    pub fn with_policies(mut self, policies: RouterPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn session(&self) -> &Arc<RiskSession> {
        &self.session
    }

    pub fn specs(&self) -> &Arc<SpecCache> {
        &self.specs
    }

    /// Route one command.
    ///
    /// `Ok` carries every outcome the venue or the risk gate decided,
    /// including failed ones. `Err` means the router could not get an
    /// answer: exhausted pre-execution retries, network down, shutdown, or
    /// a fatal transport/protocol problem.
    pub async fn route(&self, request: &GatewayRequest) -> GatewayResult<GatewayResponse> {
        let action = request.action();
        let mut lifecycle = RequestLifecycle::new(request.request_id().clone(), action);

        let wire = match request.payload() {
            Payload::Order(intent) => match self.gate_order(request.request_id(), intent) {
                Ok(wire) => wire,
                Err(reason) => {
                    lifecycle.finish(RequestState::RejectedByRisk);
                    return Ok(GatewayResponse::rejected_by_risk(reason));
                }
            },
            _ => WireRequest::from_request(request),
        };

        lifecycle.advance(RequestState::Dispatched);

        let kind = action.kind();
        let (transport, policy) = match kind {
            ActionKind::Query => (&self.query_transport, &self.policies.query),
            ActionKind::Write => (&self.write_transport, &self.policies.write),
        };
        let transport = transport.as_ref();
        let wire_ref = &wire;

        let result = self
            .invoker
            .invoke(action.as_str(), policy, move || async move {
                transport
                    .call(wire_ref)
                    .await
                    .map_err(|e| e.classify(kind))
            })
            .await;

        self.conclude(request, &mut lifecycle, result)
    }

    /// Size and submit an order intent under `request_id`.
    pub async fn submit_order(
        &self,
        request_id: RequestId,
        intent: OrderIntent,
    ) -> GatewayResult<GatewayResponse> {
        self.route(&GatewayRequest::order_send(request_id, intent))
            .await
    }

    /// Size an order from a win probability and submit it.
    ///
    /// The raw size is the capped Kelly fraction of current equity (the
    /// configured fallback fraction when `win_probability` is missing or
    /// unusable). It then goes through the same gate as any other order.
    pub async fn submit_sized_order(
        &self,
        request_id: RequestId,
        symbol: &str,
        direction: Direction,
        win_probability: Option<f64>,
    ) -> GatewayResult<GatewayResponse> {
        // An unknown symbol is rejected by the gate in `route`.
        let raw_size = self
            .specs
            .get(symbol)
            .map(|spec| {
                self.risk_gate.raw_size_for_probability(
                    win_probability,
                    self.session.current_equity(),
                    &spec,
                )
            })
            .unwrap_or(Lots::ZERO);
        self.submit_order(request_id, OrderIntent::new(symbol, direction, raw_size))
            .await
    }

    /// Send a heartbeat and record venue reachability.
    pub async fn heartbeat(&self) -> GatewayResult<GatewayResponse> {
        let request = GatewayRequest::heartbeat(internal_id("hb")?);
        let result = self.route(&request).await;
        Metrics::venue_reachable(matches!(&result, Ok(response) if !response.failed()));
        result
    }

    /// Fetch account equity and feed it to the risk session.
    pub async fn poll_equity(&self) -> GatewayResult<EquitySnapshot> {
        let snapshot = self.fetch_equity().await?;
        self.session.update_equity(snapshot);
        Ok(snapshot)
    }

    /// Fetch account equity without touching the risk session.
    ///
    /// Expects the `account_info` reply data to hold `equity` and,
    /// optionally, `unrealized_pnl`.
    pub async fn fetch_equity(&self) -> GatewayResult<EquitySnapshot> {
        let request = GatewayRequest::account_info(internal_id("equity")?);
        let response = self.route(&request).await?;
        if response.failed() {
            let retcode = match response.result_code() {
                ResultCode::Venue(code) => code,
                ResultCode::Unknown | ResultCode::RiskRejected => -1,
            };
            return Err(GatewayError::VenueRejected {
                action: Action::AccountInfo,
                retcode,
                message: response.message().to_string(),
            });
        }

        let data = response
            .data()
            .cloned()
            .ok_or_else(|| GatewayError::InvalidAccountData("reply carried no data".to_string()))?;
        serde_json::from_value(data).map_err(|e| GatewayError::InvalidAccountData(e.to_string()))
    }

    /// Run the risk gate. `Err` carries the rejection reason.
    fn gate_order(&self, request_id: &RequestId, intent: &OrderIntent) -> Result<WireRequest, String> {
        let spec = match self.specs.require(&intent.symbol) {
            Ok(spec) => spec,
            Err(e) => {
                Metrics::risk_rejected("no_spec");
                warn!(req_id = %request_id, symbol = %intent.symbol, "No venue spec for order symbol");
                return Err(e.to_string());
            }
        };

        let order = self.risk_gate.size(intent, &self.session, &spec);
        if !order.valid {
            return Err(order
                .reject_reason
                .unwrap_or_else(|| "rejected by risk gate".to_string()));
        }
        Ok(WireRequest::order(request_id, &order))
    }

    fn conclude(
        &self,
        request: &GatewayRequest,
        lifecycle: &mut RequestLifecycle,
        result: Result<WireResponse, InvokeError<TransportError>>,
    ) -> GatewayResult<GatewayResponse> {
        let action = request.action();
        let req_id = request.request_id();

        match result {
            Ok(reply) if reply.error => {
                lifecycle.finish(RequestState::VenueRejected);
                warn!(
                    req_id = %req_id,
                    action = %action,
                    retcode = reply.retcode,
                    msg = %reply.msg,
                    "Venue rejected request"
                );
                Ok(GatewayResponse::venue_rejected(reply.retcode, reply.msg))
            }
            Ok(reply) => match reply.ticket {
                Some(ticket) => {
                    lifecycle.finish(RequestState::Executed);
                    if action.is_write() {
                        info!(req_id = %req_id, action = %action, ticket, "Venue executed request");
                    }
                    Ok(GatewayResponse::executed(
                        reply.retcode,
                        reply.msg,
                        ExecutionId(ticket),
                        reply.data,
                    ))
                }
                None => {
                    error!(req_id = %req_id, action = %action, "Success reply without ticket");
                    Err(GatewayError::ProtocolViolation {
                        action,
                        detail: "success reply without ticket".to_string(),
                    })
                }
            },
            Err(InvokeError::OutcomeUnknown { attempts, error }) => {
                lifecycle.finish(RequestState::TimeoutUnknown);
                Metrics::gateway_outcome_unknown(action.as_str());
                warn!(
                    req_id = %req_id,
                    action = %action,
                    attempts,
                    error = %error,
                    "Write outcome unknown, not retrying"
                );
                Ok(GatewayResponse::outcome_unknown())
            }
            Err(
                InvokeError::RetriesExhausted { attempts, last }
                | InvokeError::BudgetExceeded { attempts, last, .. },
            ) => {
                lifecycle.finish(RequestState::ConnectionFailed);
                Err(GatewayError::ConnectionFailed {
                    action,
                    attempts,
                    source: last,
                })
            }
            Err(InvokeError::NetworkUnavailable { attempts, last }) => {
                lifecycle.finish(RequestState::ConnectionFailed);
                Err(GatewayError::NetworkUnavailable {
                    action,
                    attempts,
                    source: last,
                })
            }
            Err(InvokeError::Shutdown { .. } | InvokeError::Terminal { .. }) => {
                info!(req_id = %req_id, action = %action, "Request abandoned on shutdown");
                Err(GatewayError::Shutdown { action })
            }
            Err(InvokeError::Fatal { error, .. }) => {
                error!(req_id = %req_id, action = %action, error = %error, "Fatal transport error");
                Err(GatewayError::Fatal {
                    action,
                    source: error,
                })
            }
        }
    }
}

/// Request id for commands the router issues on its own behalf.
fn internal_id(prefix: &str) -> GatewayResult<RequestId> {
    Ok(RequestId::new(format!("{prefix}-{}", Uuid::new_v4().simple()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use bridge_core::{Money, TradeClose, VenueSpec, OUTCOME_UNKNOWN_MESSAGE};
    use bridge_risk::RiskConfig;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use tokio_util::sync::CancellationToken;

    struct Harness {
        router: GatewayRouter,
        query: Arc<MockTransport>,
        write: Arc<MockTransport>,
        session: Arc<RiskSession>,
    }

    fn harness() -> Harness {
        let query = Arc::new(MockTransport::new());
        let write = Arc::new(MockTransport::new());
        let session = Arc::new(
            RiskSession::new(
                Money::new(dec!(10000)),
                &RiskConfig::default(),
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            )
            .unwrap(),
        );
        let specs = Arc::new(
            SpecCache::from_specs([VenueSpec::new(
                "EURUSD",
                Lots::new(dec!(0.01)),
                Lots::new(dec!(0.01)),
                Lots::new(dec!(100)),
                Money::new(dec!(1000)),
            )
            .unwrap()])
            .unwrap(),
        );
        let router = GatewayRouter::new(
            Invoker::without_probe(CancellationToken::new()),
            query.clone(),
            write.clone(),
            RiskGate::default(),
            session.clone(),
            specs,
        );
        Harness {
            router,
            query,
            write,
            session,
        }
    }

    fn rid(id: &str) -> RequestId {
        RequestId::new(id).unwrap()
    }

    fn buy(size: rust_decimal::Decimal) -> OrderIntent {
        OrderIntent::new("EURUSD", Direction::Buy, Lots::new(size))
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_is_normalized_before_dispatch() {
        let h = harness();
        let response = assert_ok!(h.router.submit_order(rid("o-1"), buy(dec!(0.1131))).await);

        assert!(!response.failed());
        assert_eq!(response.state(), RequestState::Executed);
        assert!(response.execution_id().is_some());

        let calls = h.write.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payload["volume"], 0.11);
        assert_eq!(calls[0].req_id, "o-1");
        assert_eq!(h.query.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_is_not_retried() {
        let h = harness();
        h.write.push_error(TransportError::Timeout("read".into()));

        let response = h.router.submit_order(rid("o-1"), buy(dec!(1))).await.unwrap();
        assert!(response.failed());
        assert_eq!(response.result_code(), ResultCode::Unknown);
        assert_eq!(response.message(), OUTCOME_UNKNOWN_MESSAGE);
        assert_eq!(response.state(), RequestState::TimeoutUnknown);
        assert_eq!(response.execution_id(), None);
        assert_eq!(h.write.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_reset_is_not_retried() {
        let h = harness();
        h.write.push_error(TransportError::ConnectionReset("eof".into()));

        let response = h.router.submit_order(rid("o-1"), buy(dec!(1))).await.unwrap();
        assert!(response.is_outcome_unknown());
        assert_eq!(h.write.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_refused_is_retried() {
        let h = harness();
        h.write.push_error(TransportError::ConnectionRefused("refused".into()));
        h.write.push_error(TransportError::Dns("lookup".into()));

        let response = h.router.submit_order(rid("o-1"), buy(dec!(1))).await.unwrap();
        assert_eq!(response.state(), RequestState::Executed);
        assert_eq!(h.write.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_refused_exhaustion_is_raised() {
        let h = harness();
        for _ in 0..5 {
            h.write.push_error(TransportError::ConnectionRefused("refused".into()));
        }

        let err = assert_err!(h.router.submit_order(rid("o-1"), buy(dec!(1))).await);
        assert!(matches!(
            err,
            GatewayError::ConnectionFailed {
                action: Action::OrderSend,
                attempts: 5,
                ..
            }
        ));
        assert_eq!(h.write.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout_is_retried() {
        let h = harness();
        h.query.push_error(TransportError::Timeout("slow".into()));
        h.query.push_error(TransportError::ConnectionReset("eof".into()));

        let response = h.router.heartbeat().await.unwrap();
        assert!(!response.failed());
        assert_eq!(h.query.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_venue_error_is_a_response() {
        let h = harness();
        h.write.push_reply(WireResponse::err(10019, "not enough money"));

        let response = h.router.submit_order(rid("o-1"), buy(dec!(1))).await.unwrap();
        assert!(response.failed());
        assert_eq!(response.result_code(), ResultCode::Venue(10019));
        assert_eq!(response.state(), RequestState::VenueRejected);
        assert_eq!(response.message(), "not enough money");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_without_ticket_is_protocol_violation() {
        let h = harness();
        let mut reply = WireResponse::ok(1);
        reply.ticket = None;
        h.query.push_reply(reply);

        let err = h.router.heartbeat().await.unwrap_err();
        assert!(matches!(err, GatewayError::ProtocolViolation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_is_fatal() {
        let h = harness();
        h.query.push_error(TransportError::Protocol("garbage".into()));

        let err = h.router.heartbeat().await.unwrap_err();
        assert!(matches!(err, GatewayError::Fatal { .. }));
        assert_eq!(h.query.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halted_session_blocks_orders_without_dispatch() {
        let h = harness();
        h.session
            .on_trade_closed(&TradeClose::new("EURUSD", Money::new(dec!(-500))));

        let response = h.router.submit_order(rid("o-1"), buy(dec!(1))).await.unwrap();
        assert!(response.failed());
        assert_eq!(response.result_code(), ResultCode::RiskRejected);
        assert_eq!(response.state(), RequestState::RejectedByRisk);
        assert!(response.message().starts_with("daily loss limit reached"));
        assert_eq!(h.write.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_position_is_not_gated() {
        let h = harness();
        h.session
            .on_trade_closed(&TradeClose::new("EURUSD", Money::new(dec!(-500))));

        let response = h
            .router
            .route(&GatewayRequest::close_position(rid("c-1"), 42, "EURUSD"))
            .await
            .unwrap();
        assert_eq!(response.state(), RequestState::Executed);
        assert_eq!(h.write.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_symbol_rejected() {
        let h = harness();
        let intent = OrderIntent::new("XAUUSD", Direction::Sell, Lots::new(dec!(1)));

        let response = h.router.submit_order(rid("o-1"), intent).await.unwrap();
        assert_eq!(response.result_code(), ResultCode::RiskRejected);
        assert!(response.message().contains("XAUUSD"));
        assert_eq!(h.write.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_equity_feeds_session() {
        let h = harness();
        h.query.push_reply(
            WireResponse::ok(9).with_data(json!({"equity": 8900, "unrealized_pnl": -1100})),
        );

        let snapshot = h.router.poll_equity().await.unwrap();
        assert_eq!(snapshot.equity, Money::new(dec!(8900)));
        assert!(h.session.halted_reason().unwrap().is_drawdown());
        assert_eq!(h.query.calls()[0].action, Action::AccountInfo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_equity_leaves_session_alone() {
        let h = harness();
        h.query
            .push_reply(WireResponse::ok(9).with_data(json!({"equity": "8500"})));

        let snapshot = h.router.fetch_equity().await.unwrap();
        assert_eq!(snapshot.equity, Money::new(dec!(8500)));
        assert_eq!(h.session.current_equity(), Money::new(dec!(10000)));
        assert!(!h.session.is_halted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sized_order_uses_kelly_fraction() {
        let h = harness();

        // p=0.9 caps at 2% of 10000 = 200 margin => 0.2 lots.
        let response = h
            .router
            .submit_sized_order(rid("k-1"), "EURUSD", Direction::Buy, Some(0.9))
            .await
            .unwrap();
        assert_eq!(response.state(), RequestState::Executed);

        // No probability falls back to 1% => 0.1 lots.
        h.router
            .submit_sized_order(rid("k-2"), "EURUSD", Direction::Sell, None)
            .await
            .unwrap();

        let calls = h.write.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].payload["volume"], 0.2);
        assert_eq!(calls[1].payload["volume"], 0.1);
        assert_eq!(calls[1].payload["direction"], "sell");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sized_order_without_edge_is_not_dispatched() {
        let h = harness();
        let response = h
            .router
            .submit_sized_order(rid("k-1"), "EURUSD", Direction::Buy, Some(0.5))
            .await
            .unwrap();
        assert_eq!(response.state(), RequestState::RejectedByRisk);
        assert!(response.message().contains("must be positive"));

        let response = h
            .router
            .submit_sized_order(rid("k-2"), "XAUUSD", Direction::Buy, Some(0.9))
            .await
            .unwrap();
        assert!(response.message().contains("XAUUSD"));
        assert_eq!(h.write.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_equity_without_data() {
        let h = harness();
        let err = h.router.poll_equity().await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAccountData(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_stops_routing() {
        let query = Arc::new(MockTransport::new());
        let h = harness();
        let token = CancellationToken::new();
        token.cancel();
        let router = GatewayRouter::new(
            Invoker::without_probe(token),
            query.clone(),
            h.write.clone(),
            RiskGate::default(),
            h.session.clone(),
            h.router.specs().clone(),
        );

        let err = router.heartbeat().await.unwrap_err();
        assert!(matches!(err, GatewayError::Shutdown { .. }));
        assert_eq!(query.call_count(), 0);
    }
}
