//! Application lifecycle integration tests.
//!
//! Tests the running application:
//! - Preflight against a mock venue, including a rebase on live equity
//! - Spec refresh with unchanged and materially changed specs
//! - Command intake, risk halts and shutdown through the bridge handle

mod integration;
use integration::common::mock_venue::MockVenue;
use integration::common::{closed_port_url, test_config};

use bridge_core::{
    Direction, GatewayRequest, Lots, Money, OrderIntent, RequestId, RequestState, ResultCode,
    TradeClose,
};
use bridge_gateway::{MockTransport, WireResponse};
use bridge_risk::RiskGate;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use venue_bridge::{refresh_specs, AppError, Application};

fn order(id: &str, size: rust_decimal::Decimal) -> GatewayRequest {
    GatewayRequest::order_send(
        RequestId::new(id).unwrap(),
        OrderIntent::new("EURUSD", Direction::Buy, Lots::new(size)),
    )
}

/// Test that preflight loads equity and refreshes specs from the venue.
#[tokio::test]
async fn test_preflight_against_mock_venue() {
    let venue = MockVenue::start().await;
    venue.set_equity("12500").await;
    let config = test_config(venue.url(), closed_port_url("http").await);

    let app = Application::new(config).unwrap();
    assert_ok!(app.run_preflight().await);

    let router = app.router();
    assert_eq!(router.session().current_equity(), Money::new(dec!(12500)));
    assert!(!router.session().is_halted());
    assert_eq!(router.specs().version("EURUSD"), Some(2));
    assert_eq!(
        venue.actions().await,
        vec!["heartbeat", "account_info", "symbol_info"]
    );

    venue.shutdown().await;
}

/// Test that live equity below the configured start does not read as a drawdown.
#[tokio::test]
async fn test_preflight_rebases_on_lower_live_equity() {
    let venue = MockVenue::start().await;
    venue.set_equity("8500").await;
    let config = test_config(venue.url(), closed_port_url("http").await);
    assert_eq!(config.start_equity, dec!(10000));

    let app = Application::new(config).unwrap();
    assert_ok!(app.run_preflight().await);

    let state = app.router().session().snapshot();
    assert_eq!(state.session_start_equity, Money::new(dec!(8500)));
    assert_eq!(state.peak_equity, Money::new(dec!(8500)));
    assert_eq!(state.current_equity, Money::new(dec!(8500)));
    assert!(state.halted_reason.is_none());

    let spec = app.router().specs().get("EURUSD").unwrap();
    let order = RiskGate::default().size(
        &OrderIntent::new("EURUSD", Direction::Buy, Lots::new(dec!(0.1))),
        app.router().session(),
        &spec,
    );
    assert!(order.valid, "{:?}", order.reject_reason);

    venue.shutdown().await;
}

/// Test that preflight fails when nothing answers on the socket channel.
#[tokio::test]
async fn test_preflight_fails_without_venue() {
    let config = test_config(
        closed_port_url("ws").await,
        closed_port_url("http").await,
    );
    let app = Application::new(config).unwrap();

    let err = app.run_preflight().await.unwrap_err();
    assert!(matches!(err, AppError::Preflight(_)), "got {err:?}");
}

/// Test that a material spec change is reported but not applied.
#[tokio::test]
async fn test_material_spec_change_not_applied() {
    let venue = MockVenue::start().await;
    let app = Application::new(test_config(venue.url(), closed_port_url("http").await)).unwrap();

    venue
        .set_spec(
            "EURUSD",
            json!({
                "symbol": "EURUSD",
                "min_lot": "0.1",
                "lot_step": "0.1",
                "max_lot": "50",
                "margin_per_lot": "1000",
            }),
        )
        .await;

    assert_eq!(refresh_specs(app.router()).await, 0);
    let spec = app.router().specs().get("EURUSD").unwrap();
    assert_eq!(spec.max_lot(), Lots::new(dec!(100)));
    assert_eq!(app.router().specs().version("EURUSD"), Some(1));

    venue.shutdown().await;
}

/// Test command intake, halts and shutdown through the bridge handle.
#[tokio::test(start_paused = true)]
async fn test_handle_routes_and_halts() {
    let query = Arc::new(MockTransport::new());
    let write = Arc::new(MockTransport::new());
    let shutdown = CancellationToken::new();
    let app = Application::with_transports(
        test_config("ws://127.0.0.1:1".into(), "http://127.0.0.1:1".into()),
        query.clone(),
        write.clone(),
        shutdown.clone(),
    )
    .unwrap();
    let handle = app.handle();
    let session = app.router().session().clone();
    let running = tokio::spawn(app.run());

    let response = handle.route(order("o-1", dec!(0.1131))).await.unwrap();
    assert_eq!(response.state(), RequestState::Executed);
    assert_eq!(write.calls()[0].payload["volume"], 0.11);

    handle
        .trade_closed(TradeClose::new("EURUSD", Money::new(dec!(-500))))
        .await
        .unwrap();
    let response = handle.route(order("o-2", dec!(1))).await.unwrap();
    assert_eq!(response.result_code(), ResultCode::RiskRejected);
    assert!(session.is_halted());
    assert_eq!(write.call_count(), 1);

    // Daily-loss halts are not operator-acknowledgeable.
    assert!(!handle.acknowledge_drawdown_halt().await.unwrap());

    shutdown.cancel();
    timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let err = handle.route(order("o-3", dec!(1))).await.unwrap_err();
    assert!(matches!(err, AppError::Shutdown));
}

/// Test that the handle sizes orders from a win probability.
#[tokio::test(start_paused = true)]
async fn test_handle_submits_probability_sized_order() {
    let query = Arc::new(MockTransport::new());
    let write = Arc::new(MockTransport::new());
    let shutdown = CancellationToken::new();
    let app = Application::with_transports(
        test_config("ws://127.0.0.1:1".into(), "http://127.0.0.1:1".into()),
        query,
        write.clone(),
        shutdown.clone(),
    )
    .unwrap();
    let handle = app.handle();
    let running = tokio::spawn(app.run());

    let response = handle
        .submit_sized_order(RequestId::new("k-1").unwrap(), "EURUSD", Direction::Buy, Some(0.9))
        .await
        .unwrap();
    assert_eq!(response.state(), RequestState::Executed);
    assert_eq!(write.calls()[0].payload["volume"], 0.2);

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

/// Test that an acknowledged drawdown halt lets orders through again.
#[tokio::test(start_paused = true)]
async fn test_drawdown_acknowledgement() {
    let query = Arc::new(MockTransport::new());
    let write = Arc::new(MockTransport::new());
    let shutdown = CancellationToken::new();
    let app = Application::with_transports(
        test_config("ws://127.0.0.1:1".into(), "http://127.0.0.1:1".into()),
        query.clone(),
        write.clone(),
        shutdown.clone(),
    )
    .unwrap();

    query.push_reply(WireResponse::ok(1).with_data(json!({"equity": "8900"})));
    app.router().poll_equity().await.unwrap();
    assert!(app.router().session().halted_reason().unwrap().is_drawdown());

    let handle = app.handle();
    let running = tokio::spawn(app.run());

    let response = handle.route(order("o-1", dec!(1))).await.unwrap();
    assert_eq!(response.state(), RequestState::RejectedByRisk);
    assert!(response.message().starts_with("max drawdown reached"));

    assert!(handle.acknowledge_drawdown_halt().await.unwrap());
    let response = handle.route(order("o-2", dec!(1))).await.unwrap();
    assert_eq!(response.state(), RequestState::Executed);
    assert_eq!(write.call_count(), 1);

    shutdown.cancel();
    running.await.unwrap().unwrap();
}
