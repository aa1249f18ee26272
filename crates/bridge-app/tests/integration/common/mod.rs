#![allow(dead_code)]

pub mod mock_venue;

use bridge_core::{Lots, Money, RawVenueSpec};
use rust_decimal_macros::dec;
use venue_bridge::AppConfig;

/// Config with background tasks and the network probe disabled.
pub fn test_config(socket_url: String, direct_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.venue.socket_url = socket_url;
    config.venue.direct_url = direct_url;
    config.venue.connect_timeout_ms = 500;
    config.venue.recv_timeout_ms = 1_000;
    config.venue.request_timeout_ms = 1_000;
    config.probe.enabled = false;
    config.schedule.heartbeat_interval_secs = 0;
    config.schedule.equity_poll_interval_secs = 0;
    config.schedule.rollover_check_interval_secs = 0;
    config.schedule.spec_refresh_interval_secs = 0;
    config.retry.query.overall_timeout_ms = 2_000;
    config.retry.query.max_attempts = Some(3);
    config.retry.query.initial_wait_ms = 20;
    config.retry.query.max_wait_ms = 50;
    config.symbols = vec![eurusd()];
    config
}

pub fn eurusd() -> RawVenueSpec {
    RawVenueSpec {
        symbol: "EURUSD".to_string(),
        min_lot: Lots::new(dec!(0.01)),
        lot_step: Lots::new(dec!(0.01)),
        max_lot: Lots::new(dec!(100)),
        margin_per_lot: Money::new(dec!(1000)),
    }
}

/// A port with nothing listening.
pub async fn closed_port_url(scheme: &str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("{scheme}://{addr}")
}
